//! Data carried through one crawl: the per-page extraction and the run outcome.

use std::fmt;
use std::path::PathBuf;

/// Everything derived from one fetched page, in the order it is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExtraction {
    /// Title as matched by the title selector (trimmed).
    pub title: String,
    pub ascii_title: String,
    /// Slug used for the page file name (without extension).
    pub filename: String,
    /// Flattened text of each content node, document order.
    pub raw_content_nodes: Vec<String>,
    /// Lower-cased, trimmed first raw node. Decides whether a title line is inserted.
    pub first_line: String,
    pub normalized_content: String,
    /// Normalized content with its `## ` heading; this is what gets written.
    pub final_content: String,
    pub next_link_raw: Option<String>,
}

/// Why a chain ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The next-link selector matched nothing.
    NoLink,
    /// A next link was found but is neither site-absolute nor under the base URL.
    InvalidLink { raw: String },
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::NoLink => f.write_str("no next link found"),
            Termination::InvalidLink { raw } => {
                write!(f, "next link {:?} is not a valid continuation", raw)
            }
        }
    }
}

/// Result of a run that ended normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Page files written, in crawl order.
    pub pages: Vec<PathBuf>,
    pub termination: Termination,
}
