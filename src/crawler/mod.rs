//! The crawl loop: fetch a page, extract and normalize it, write it out, then follow the
//! next link until the chain ends.

pub mod client;
pub mod document;
pub mod error;
pub mod links;
pub mod pacer;
pub mod select;
pub mod text;

pub use client::{FetchedPage, PageClient, PageClientBuilder};
pub use error::{CrawlError, PageField};
pub use links::{resolve_next, BaseUrl, NextLink};
pub use pacer::Pacer;

use crate::config::CrawlConfig;
use crate::model::{CrawlReport, PageExtraction, Termination};
use crate::output::{self, OutputLayout};
use reqwest::Url;
use scraper::Html;
use select::{select_page, RawPage, SourceSelectors};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Span};

/// Everything a run needs, built once and lent to the crawler.
#[derive(Debug)]
pub struct CrawlContext {
    pub config: CrawlConfig,
    pub client: PageClient,
    pub output: OutputLayout,
    /// Span tagging every log line of the run with its series and source.
    pub span: Span,
}

impl CrawlContext {
    pub fn new(config: CrawlConfig) -> Result<Self, reqwest::Error> {
        let client = PageClient::builder()
            .headers(config.headers.clone())
            .timeout(config.timeout)
            .build()?;
        let output = OutputLayout::new(&config.basedir, &config.series_id);
        let span = info_span!("crawl", series = %config.series_id, source = %config.source);
        Ok(Self {
            config,
            client,
            output,
            span,
        })
    }
}

/// Loop state. The URL inside `Running` is the only cursor across iterations.
#[derive(Debug)]
pub enum CrawlState {
    Running(Url),
    Terminated(Termination),
    Aborted(CrawlError),
}

/// Turn raw selector matches into the text that gets written.
///
/// The heading decision looks at the raw first content node; the heading is then put
/// in front of the normalized text.
pub fn build_extraction(raw: RawPage) -> PageExtraction {
    let ascii_title = text::transliterate(&raw.title);
    let filename = text::derive_filename(&raw.title);
    let first_line = raw
        .content_nodes
        .first()
        .map(|n| text::heading_probe(n))
        .unwrap_or_default();
    let normalized_content = text::normalize(&raw.content_nodes);
    let final_content = text::reconcile_heading(&raw.title, &first_line, &normalized_content);
    PageExtraction {
        title: raw.title,
        ascii_title,
        filename,
        raw_content_nodes: raw.content_nodes,
        first_line,
        normalized_content,
        final_content,
        next_link_raw: raw.next_link,
    }
}

/// Selector engine plus text pipeline for one parsed page.
pub fn extract_page(
    document: &Html,
    selectors: &SourceSelectors,
    url: &Url,
) -> Result<PageExtraction, CrawlError> {
    let raw = select_page(document, selectors, url)?;
    Ok(build_extraction(raw))
}

/// Sequential crawler over one chain of pages. `S` performs the pause between pages.
pub struct Crawler<'a, S = fn(Duration)> {
    ctx: &'a CrawlContext,
    pacer: Pacer,
    sleep: S,
    written: Vec<PathBuf>,
}

impl<'a> Crawler<'a> {
    pub fn new(ctx: &'a CrawlContext) -> Self {
        Self::with_sleep(ctx, std::thread::sleep)
    }
}

impl<'a, S: FnMut(Duration)> Crawler<'a, S> {
    /// Crawler that passes each inter-page delay to `sleep` instead of blocking.
    pub fn with_sleep(ctx: &'a CrawlContext, sleep: S) -> Self {
        Self {
            ctx,
            pacer: Pacer::new(ctx.config.delay_ms),
            sleep,
            written: Vec::new(),
        }
    }

    /// Run from the configured start URL until the chain ends or a step fails.
    pub fn run(mut self) -> Result<CrawlReport, CrawlError> {
        let ctx = self.ctx;
        let _enter = ctx.span.enter();
        let mut state = CrawlState::Running(ctx.config.start_url.clone());
        loop {
            state = match state {
                CrawlState::Running(url) => self.advance(&url),
                CrawlState::Terminated(termination) => {
                    info!(pages = self.written.len(), %termination, "End of chapters reached");
                    return Ok(CrawlReport {
                        pages: self.written,
                        termination,
                    });
                }
                CrawlState::Aborted(e) => return Err(e),
            };
        }
    }

    fn advance(&mut self, url: &Url) -> CrawlState {
        match self.step(url) {
            Ok(NextLink::Follow(next)) => {
                self.pacer.pause_with(&mut self.sleep);
                CrawlState::Running(next)
            }
            Ok(NextLink::End(termination)) => CrawlState::Terminated(termination),
            Err(e) => CrawlState::Aborted(e),
        }
    }

    /// One iteration: fetch, extract, persist, resolve the next link.
    fn step(&mut self, url: &Url) -> Result<NextLink, CrawlError> {
        info!(%url, "Fetch URL");
        let page = self.ctx.client.fetch(url)?;
        if page.url() != url {
            debug!(final_url = %page.url(), "Followed redirect");
        }

        debug!("Parsing HTML document");
        let charset = page.charset().map(str::to_owned);
        let document = document::parse_document(page.into_reader(), charset.as_deref(), url)?;
        let extraction = extract_page(&document, &self.ctx.config.selectors, url)?;
        debug!(title = %extraction.title, filename = %extraction.filename, "Extracted page");

        self.persist(&extraction)?;

        debug!(next = ?extraction.next_link_raw, "Next URL (selector)");
        let next = resolve_next(extraction.next_link_raw.as_deref(), &self.ctx.config.base_url);
        match &next {
            NextLink::Follow(next_url) => debug!(%next_url, "Next URL (normalized)"),
            NextLink::End(Termination::NoLink) => {
                info!("No next URL on page. End of chapters is reached.")
            }
            NextLink::End(Termination::InvalidLink { raw }) => {
                warn!(%raw, "Next URL is not a valid continuation. End of chapters is reached.")
            }
        }
        Ok(next)
    }

    fn persist(&mut self, extraction: &PageExtraction) -> Result<(), CrawlError> {
        let path = self.ctx.output.page_path(&extraction.filename);
        output::write_new(&path, &extraction.final_content)?;
        self.written.push(path);
        if self.ctx.config.combine {
            let mut entry = extraction.final_content.clone();
            entry.push_str(text::LINE_SEPARATOR);
            output::append(&self.ctx.output.archive_path(), &entry)?;
        }
        Ok(())
    }
}

/// Build a crawler over `ctx` and run it to the end of the chain.
pub fn crawl(ctx: &CrawlContext) -> Result<CrawlReport, CrawlError> {
    Crawler::new(ctx).run()
}
