//! Remote content transport abstraction.
//!
//! The core never talks HTTP directly; it consumes a [`Transport`] so tests
//! can substitute in-memory fixtures and embedders can supply their own
//! client. Retry and wall-clock timeout policy belong to the transport
//! implementation, never to the core — the core bounds fetches by byte
//! count only.

mod http;

pub use http::HttpTransport;

#[cfg(test)]
pub(crate) use http::tests::MemoryTransport;

use std::io::Read;

use crate::error::Result;

/// Byte-stream access to remote resources.
///
/// Implementations must map HTTP 404/410 to [`UpdateError::NotFound`] and
/// every other non-2xx status or connection failure to
/// [`UpdateError::Transport`], so callers can treat missing optional
/// resources differently from hard failures.
///
/// Requests flagged `hostile` (plus any request to a host in
/// [`ALWAYS_HOSTILE_HOSTS`]) must be shaped to resemble ordinary browser
/// navigation traffic rather than identifying the tool; some third-party
/// CDNs block anything else.
///
/// [`UpdateError::NotFound`]: crate::error::UpdateError::NotFound
/// [`UpdateError::Transport`]: crate::error::UpdateError::Transport
pub trait Transport: Send + Sync {
    /// Opens a streamed GET of `url`.
    fn get(&self, url: &str, hostile: bool) -> Result<Box<dyn Read + Send>>;
}

/// Hosts known to block non-browser clients; requests to them always go out
/// disguised regardless of the caller's `hostile` flag.
pub const ALWAYS_HOSTILE_HOSTS: &[&str] = &[
    "beta.curseforge.com",
    "www.curseforge.com",
    "curseforge.com",
    "minecraft.curseforge.com",
    "mediafilez.forgecdn.net",
    "mediafiles.forgecdn.net",
    "forgecdn.net",
    "edge.forgecdn.net",
];

/// True if the URL's host is on the always-hostile list.
pub(crate) fn is_always_hostile(url: &str) -> bool {
    match host_of(url) {
        Some(host) => ALWAYS_HOSTILE_HOSTS.contains(&host),
        None => false,
    }
}

/// Extracts the host component of an http(s) URL, dropping any port.
fn host_of(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    Some(host.split(':').next().unwrap_or(host))
}
