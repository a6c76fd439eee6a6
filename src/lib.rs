//! chapterchain: follows a site's next-chapter links and saves each page as plain text.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod model;
pub mod output;

// Re-exports for CLI and consumers.
pub use config::{load_config, Config, ConfigError, CrawlConfig, Overrides};
pub use crawler::{crawl, CrawlContext, CrawlError, CrawlState, Crawler, NextLink, Pacer, PageClient};
pub use model::{CrawlReport, PageExtraction, Termination};
pub use output::OutputLayout;
