//! CLI parsing and orchestration. Loads config, builds the crawl context, runs the chain.
//! Maps errors to exit codes.

use crate::config::{self, ConfigError, CrawlConfig, Overrides};
use crate::crawler::{crawl, CrawlContext, CrawlError};
use crate::model::CrawlReport;
use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Crawl(#[from] CrawlError),
}

impl CliRunError {
    /// 0 is reserved for a chain that ended normally; each fatal category has its own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) | CliRunError::Config(_) => 1,
            CliRunError::Crawl(e) => match e {
                CrawlError::BadStatus { .. } => 2,
                CrawlError::Transport { .. } | CrawlError::BodyRead { .. } => 3,
                CrawlError::Extraction { .. } => 4,
                CrawlError::OutputCollision { .. } => 5,
                CrawlError::Output { .. } => 6,
            },
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "chapterchain")]
#[command(about = "Follow a site's next-chapter links and save every page as plain text")]
#[command(
    after_help = "Config file keys (basedir, [requests], [sources.<name>], [serie]) are documented in the README. CLI flags override config."
)]
pub struct Args {
    /// Config file. Default: ./conf.toml, then $XDG_CONFIG_HOME/chapterchain/config.toml.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Start the chain here instead of at serie.starturl.
    #[arg(long)]
    pub start_url: Option<String>,

    /// Output root directory (overrides basedir).
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Average delay between pages in milliseconds (overrides requests.delay_ms).
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Request timeout in seconds (overrides requests.timeout_s).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Also append every page to {basedir}/{id}/{id}.txt, even if combine_flag is off.
    #[arg(long)]
    pub combine: bool,

    /// Validate config and print what would be crawled without fetching anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Errors only.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print the full error cause chain.
    #[arg(long)]
    pub verbose_errors: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            start_url: self.start_url.clone(),
            basedir: self.output_dir.clone(),
            delay_ms: self.delay_ms,
            timeout_s: self.timeout,
            combine: self.combine,
        }
    }
}

/// Load and resolve the config named by the arguments.
pub fn resolve_config(args: &Args) -> Result<CrawlConfig, CliRunError> {
    let file = config::load_config(args.config.as_deref())?;
    Ok(file.resolve(&args.overrides())?)
}

fn print_plan(config: &CrawlConfig) {
    eprintln!("Source: {} ({})", config.source, config.base_url.as_str());
    eprintln!("  title:    {}", config.selectors.title);
    eprintln!("  contents: {}", config.selectors.content);
    eprintln!("  nexturl:  {}", config.selectors.next_link);
    eprintln!("Series: {}", config.series_id);
    eprintln!("Start: {}", config.start_url);
    eprintln!(
        "Output: {}",
        config.basedir.join(&config.series_id).display()
    );
    eprintln!("Combined archive: {}", if config.combine { "yes" } else { "no" });
    eprintln!(
        "Timeout: {}s, average delay: {}ms",
        config.timeout.as_secs(),
        config.delay_ms
    );
}

/// Entry point for the CLI. Returns the crawl report when the chain ended normally
/// (`None` for a dry run).
pub fn run(args: &Args) -> Result<Option<CrawlReport>, CliRunError> {
    let config = resolve_config(args)?;
    tracing::debug!("Finished loading configuration");

    if args.dry_run {
        print_plan(&config);
        return Ok(None);
    }

    let ctx = CrawlContext::new(config)
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;
    let report = crawl(&ctx)?;

    if !args.quiet {
        eprintln!(
            "Wrote {} page(s) to {} ({})",
            report.pages.len(),
            ctx.output.series_dir().display(),
            report.termination
        );
    }
    Ok(Some(report))
}
