//! Output files: one new file per page, plus the optional combined archive per series.

use crate::crawler::error::CrawlError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Where a series writes its files: `{basedir}/{series_id}/`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    series_dir: PathBuf,
    series_id: String,
}

impl OutputLayout {
    pub fn new(basedir: &Path, series_id: &str) -> Self {
        Self {
            series_dir: basedir.join(series_id),
            series_id: series_id.to_string(),
        }
    }

    pub fn series_dir(&self) -> &Path {
        &self.series_dir
    }

    /// `{basedir}/{series_id}/{filename}.txt`
    pub fn page_path(&self, filename: &str) -> PathBuf {
        self.series_dir.join(format!("{}.txt", filename))
    }

    /// `{basedir}/{series_id}/{series_id}.txt`
    pub fn archive_path(&self) -> PathBuf {
        self.series_dir.join(format!("{}.txt", self.series_id))
    }
}

fn create_parent(path: &Path) -> Result<(), CrawlError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CrawlError::Output {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write `content` to a new file. An existing file is never touched: that case is
/// [CrawlError::OutputCollision].
pub fn write_new(path: &Path, content: &str) -> Result<(), CrawlError> {
    create_parent(path)?;
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                error!(path = %path.display(), "Can't write content to an already existing path");
                CrawlError::OutputCollision {
                    path: path.to_path_buf(),
                }
            } else {
                CrawlError::Output {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
    debug!(path = %path.display(), "Write content");
    f.write_all(content.as_bytes())
        .map_err(|e| CrawlError::Output {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Append `content` to a file, creating it (and its directories) when absent.
pub fn append(path: &Path, content: &str) -> Result<(), CrawlError> {
    create_parent(path)?;
    debug!(path = %path.display(), "Append content");
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CrawlError::Output {
            path: path.to_path_buf(),
            source: e,
        })?;
    f.write_all(content.as_bytes())
        .map_err(|e| CrawlError::Output {
            path: path.to_path_buf(),
            source: e,
        })
}
