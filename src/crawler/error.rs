//! Fatal crawl errors. Every variant aborts the run; none are retried or skipped.

use std::path::PathBuf;
use thiserror::Error;

/// Which selector came back empty on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageField {
    Title,
    Content,
}

impl std::fmt::Display for PageField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageField::Title => f.write_str("title"),
            PageField::Content => f.write_str("content"),
        }
    }
}

/// Errors raised inside the crawl loop.
#[derive(Debug, Error)]
pub enum CrawlError {
    // HTTP and network
    #[error("HTTP {status} {reason} when fetching: {url}")]
    BadStatus {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("Network error: could not reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: std::io::Error,
    },

    // Extraction
    #[error("No {field} found at {url}: selector matched nothing (page layout changed or selector misconfigured).")]
    Extraction { url: String, field: PageField },

    // Output
    #[error("Refusing to overwrite existing output file: {path}")]
    OutputCollision { path: PathBuf },

    #[error("Failed to write output: {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
