//! Config file loading and resolution. Search order when no path is given: ./conf.toml,
//! then $XDG_CONFIG_HOME/chapterchain/config.toml (or ~/.config/chapterchain/config.toml).

use crate::crawler::links::BaseUrl;
use crate::crawler::select::{Query, SourceSelectors};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_MS: u64 = 2000;

/// Errors detected before the crawl starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config file found. Looked in: {}", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Source [{source_name}] baseurl [{url}] is missing url protocol")]
    MissingScheme { source_name: String, url: String },

    #[error("Invalid URL in {field}: {input}: {reason}")]
    InvalidUrl {
        field: String,
        input: String,
        reason: String,
    },

    #[error("Series refers to unknown source '{name}'. Known sources: {known}")]
    UnknownSource { name: String, known: String },

    #[error("Invalid selector in sources.{source_name}.selectors.{field}: {reason}")]
    InvalidSelector {
        source_name: String,
        field: &'static str,
        reason: String,
    },

    #[error("Invalid request header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("{0}")]
    Invalid(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Config file contents.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Root directory for output. Paths are relative to CWD. Default ".".
    #[serde(default)]
    pub basedir: Option<PathBuf>,
    #[serde(default)]
    pub requests: RequestConfig,
    /// Per-site selector table keyed by source name.
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,
    pub serie: SerieConfig,
}

/// `[requests]`: applied to every fetch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RequestConfig {
    pub timeout_s: u64,
    /// Average delay between pages in milliseconds.
    pub delay_ms: u64,
    pub headers: BTreeMap<String, String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_s: DEFAULT_TIMEOUT_SECS,
            delay_ms: DEFAULT_DELAY_MS,
            headers: BTreeMap::new(),
        }
    }
}

/// `[sources.<name>]`
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub baseurl: String,
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    pub title: QueryConfig,
    pub contents: QueryConfig,
    pub nexturl: QueryConfig,
}

/// A selector is either a bare CSS string (element text) or `{ css, attr }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum QueryConfig {
    Css(String),
    Detailed { css: String, attr: Option<String> },
}

impl QueryConfig {
    fn compile(&self, default_attr: Option<&str>) -> Result<Query, String> {
        let (css, attr) = match self {
            QueryConfig::Css(css) => (css.as_str(), default_attr),
            QueryConfig::Detailed { css, attr } => (css.as_str(), attr.as_deref().or(default_attr)),
        };
        match attr {
            Some(a) => Query::attr(css, a),
            None => Query::text(css),
        }
    }
}

/// `[serie]`: the chain to crawl.
#[derive(Debug, Clone, Deserialize)]
pub struct SerieConfig {
    pub id: String,
    pub source: String,
    pub starturl: String,
    #[serde(default)]
    pub combine_flag: bool,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub start_url: Option<String>,
    pub basedir: Option<PathBuf>,
    pub delay_ms: Option<u64>,
    pub timeout_s: Option<u64>,
    pub combine: bool,
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub source: String,
    pub base_url: BaseUrl,
    pub selectors: SourceSelectors,
    pub start_url: Url,
    pub series_id: String,
    pub combine: bool,
    pub timeout: Duration,
    pub headers: HeaderMap,
    pub delay_ms: u64,
    pub basedir: PathBuf,
}

/// Load the config from `path`, or search the default locations when `None`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        return read_config(path);
    }
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Read {
        path: PathBuf::from("."),
        source: e,
    })?;
    let mut paths = vec![cwd.join("conf.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("chapterchain").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return read_config(path);
        }
    }
    Err(ConfigError::NotFound { searched: paths })
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&s).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let key = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        let val = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        map.insert(key, val);
    }
    Ok(map)
}

fn validate_series_id(id: &str) -> Result<(), ConfigError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ConfigError::Invalid("serie.id cannot be empty".to_string()));
    }
    if id == "." || id == ".." || id.contains('/') || id.contains('\\') {
        return Err(ConfigError::Invalid(format!(
            "serie.id must be a single directory name, got '{}'",
            id
        )));
    }
    Ok(())
}

impl Config {
    /// Pick the series' source from the strategy table, compile its selectors and apply
    /// overrides.
    pub fn resolve(&self, overrides: &Overrides) -> Result<CrawlConfig, ConfigError> {
        let source_name = self.serie.source.as_str();
        let source = self.sources.get(source_name).ok_or_else(|| {
            let mut known: Vec<&str> = self.sources.keys().map(String::as_str).collect();
            known.sort_unstable();
            ConfigError::UnknownSource {
                name: source_name.to_string(),
                known: if known.is_empty() {
                    "(none)".to_string()
                } else {
                    known.join(", ")
                },
            }
        })?;

        let base_url = BaseUrl::parse(source_name, &source.baseurl)?;

        let compile = |field: &'static str, q: &QueryConfig, default_attr: Option<&str>| {
            q.compile(default_attr)
                .map_err(|reason| ConfigError::InvalidSelector {
                    source_name: source_name.to_string(),
                    field,
                    reason,
                })
        };
        let selectors = SourceSelectors {
            title: compile("title", &source.selectors.title, None)?,
            content: compile("contents", &source.selectors.contents, None)?,
            next_link: compile("nexturl", &source.selectors.nexturl, Some("href"))?,
        };

        let start_raw = overrides
            .start_url
            .as_deref()
            .unwrap_or(self.serie.starturl.as_str());
        let start_url = Url::parse(start_raw).map_err(|e| ConfigError::InvalidUrl {
            field: "serie.starturl".to_string(),
            input: start_raw.to_string(),
            reason: e.to_string(),
        })?;

        validate_series_id(&self.serie.id)?;

        Ok(CrawlConfig {
            source: source_name.to_string(),
            base_url,
            selectors,
            start_url,
            series_id: self.serie.id.trim().to_string(),
            combine: overrides.combine || self.serie.combine_flag,
            timeout: Duration::from_secs(overrides.timeout_s.unwrap_or(self.requests.timeout_s)),
            headers: build_headers(&self.requests.headers)?,
            delay_ms: overrides.delay_ms.unwrap_or(self.requests.delay_ms),
            basedir: overrides
                .basedir
                .clone()
                .or_else(|| self.basedir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}
