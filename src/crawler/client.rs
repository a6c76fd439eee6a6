//! Blocking HTTP client for page fetches. One GET per call, no retries.

use crate::crawler::error::CrawlError;
use reqwest::header::{HeaderMap, CONTENT_TYPE, USER_AGENT};
use reqwest::{StatusCode, Url};
use std::io::Read;
use std::time::Duration;
use tracing::error;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; chapterchain/0.1; +https://github.com/chapterchain)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Blocking HTTP client carrying the configured timeout and headers.
#[derive(Debug)]
pub struct PageClient {
    inner: reqwest::blocking::Client,
}

/// A page that answered 200. The body has not been read yet.
#[derive(Debug)]
pub struct FetchedPage {
    url: Url,
    charset: Option<String>,
    response: reqwest::blocking::Response,
}

impl FetchedPage {
    /// Final URL after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `charset` parameter of the `Content-Type` header.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Body as a byte stream for the HTML parser.
    pub fn into_reader(self) -> impl Read {
        self.response
    }
}

impl PageClient {
    /// Build a client with the default User-Agent and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> PageClientBuilder {
        PageClientBuilder::default()
    }

    /// GET `url`. Anything other than exactly 200 is [CrawlError::BadStatus]; network
    /// failures are [CrawlError::Transport].
    pub fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError> {
        let response = self
            .inner
            .get(url.clone())
            .send()
            .map_err(|e| CrawlError::Transport {
                url: url.to_string(),
                source: e,
            })?;
        let status = response.status();
        if status != StatusCode::OK {
            let reason = status.canonical_reason().unwrap_or("").to_string();
            error!(status = status.as_u16(), %reason, %url, "Page status");
            return Err(CrawlError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
                reason,
            });
        }
        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_type_charset);
        Ok(FetchedPage {
            url: response.url().clone(),
            charset,
            response,
        })
    }
}

fn content_type_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Builder for PageClient with headers and timeout.
#[derive(Debug)]
pub struct PageClientBuilder {
    headers: HeaderMap,
    timeout: Duration,
}

impl Default for PageClientBuilder {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl PageClientBuilder {
    /// Headers sent verbatim on every request. A User-Agent here replaces the default.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Whole-request timeout. Default 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<PageClient, reqwest::Error> {
        let mut builder = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));
        if !self.headers.contains_key(USER_AGENT) {
            builder = builder.user_agent(DEFAULT_USER_AGENT);
        }
        let inner = builder.default_headers(self.headers).build()?;
        Ok(PageClient { inner })
    }
}
