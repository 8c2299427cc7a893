//! HTTP transport over reqwest.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use super::{is_always_hostile, Transport};
use crate::error::{Result, UpdateError};

/// Default timeout for requests (30 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How much of an error response body to quote in transport errors.
const ERROR_SNIPPET_LIMIT: u64 = 512;

/// Identity sent for ordinary, non-hostile requests.
const TOOL_USER_AGENT: &str = concat!(
    "packsync/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/packsync/packsync)"
);

/// Identity sent for hostile requests. The rv: token is locked at 109 in
/// real Firefox builds while the trailing version keeps moving.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/128.0";

/// Real HTTP transport using a blocking reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a transport with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            UpdateError::Transport {
                url: String::new(),
                detail: format!("failed to create HTTP client: {e}"),
            }
        })?;
        Ok(Self { client })
    }
}

/// Headers a browser sends when navigating to a document.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        "Accept-Language",
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("same-origin"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert("TE", HeaderValue::from_static("trailers"));
    headers
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, hostile: bool) -> Result<Box<dyn Read + Send>> {
        let hostile = hostile || is_always_hostile(url);

        let request = if hostile {
            self.client.get(url).headers(browser_headers())
        } else {
            self.client
                .get(url)
                .header(USER_AGENT, HeaderValue::from_static(TOOL_USER_AGENT))
        };

        let response = request.send().map_err(|e| UpdateError::Transport {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

        let status = response.status();
        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Err(UpdateError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let mut snippet = String::new();
            let mut body = response.take(ERROR_SNIPPET_LIMIT);
            if body.read_to_string(&mut snippet).is_err() {
                snippet = "(unreadable response body)".to_string();
            }
            return Err(UpdateError::Transport {
                url: url.to_string(),
                detail: format!("HTTP {status}: {snippet}"),
            });
        }

        Ok(Box::new(response))
    }
}
