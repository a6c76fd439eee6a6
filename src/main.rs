use tracing_subscriber::EnvFilter;

/// RUST_LOG wins when set; otherwise verbosity flags pick the filter.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("chapterchain=info,warn"),
                1 => EnvFilter::new("chapterchain=debug,info"),
                2 => EnvFilter::new("chapterchain=trace,debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = chapterchain::cli::Args::parse();
    setup_logging(args.verbose, args.quiet);
    if let Err(e) = chapterchain::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose_errors {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
