//! Next-link validation and resolution.

use crate::config::ConfigError;
use crate::model::Termination;
use reqwest::Url;

/// Source base URL, kept both as configured (for the prefix check) and parsed (for joining).
#[derive(Debug, Clone)]
pub struct BaseUrl {
    raw: String,
    url: Url,
}

impl BaseUrl {
    /// Validate a configured base URL. It must carry a scheme separator and parse as a URL.
    pub fn parse(source: &str, raw: &str) -> Result<Self, ConfigError> {
        if !raw.to_lowercase().contains("://") {
            return Err(ConfigError::MissingScheme {
                source_name: source.to_string(),
                url: raw.to_string(),
            });
        }
        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            field: format!("sources.{}.baseurl", source),
            input: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            url,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Outcome of link resolution: follow the next page or stop the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextLink {
    Follow(Url),
    End(Termination),
}

/// Decide where the chain goes after the current page.
///
/// Only links that are site-absolute (`/...`) or start with the configured base URL are
/// followed. Anything else ends the chain as [Termination::InvalidLink].
pub fn resolve_next(raw: Option<&str>, base: &BaseUrl) -> NextLink {
    let Some(raw) = raw else {
        return NextLink::End(Termination::NoLink);
    };
    let link = raw.trim();
    if !(link.starts_with('/') || link.starts_with(base.as_str())) {
        return NextLink::End(Termination::InvalidLink {
            raw: link.to_string(),
        });
    }
    match base.url().join(link) {
        Ok(url) => NextLink::Follow(url),
        Err(_) => NextLink::End(Termination::InvalidLink {
            raw: link.to_string(),
        }),
    }
}
