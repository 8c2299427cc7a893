//! Bounded, verified remote document loading.
//!
//! Every fetch here is bounded by a byte budget, never a wall clock: the
//! body is read through a hard `limit + 1` cap and rejected the instant it
//! would exceed the limit. Integrity comes from one of two sources — a
//! detached Ed25519 signature for the top manifest, or a digest pinned by a
//! parent document for everything below it.

use std::io::Read;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tracing::warn;

use super::Document;
use crate::error::{Result, UpdateError};
use crate::hash::HashFunction;
use crate::transport::Transport;

pub(crate) const K: usize = 1024;

/// Detached signatures are 64 bytes; anything near this limit is wrong.
const SIGNATURE_LIMIT: usize = 512;

/// Fetches a resource into memory, failing with [`UpdateError::TooLarge`]
/// once `limit` would be exceeded. At most `limit + 1` bytes are ever
/// buffered.
pub fn fetch_limited(transport: &dyn Transport, url: &str, limit: usize) -> Result<Vec<u8>> {
    let stream = transport.get(url, false)?;
    let mut body = Vec::new();
    stream
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| UpdateError::Transport {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
    if body.len() > limit {
        return Err(UpdateError::TooLarge {
            url: url.to_string(),
            limit,
        });
    }
    Ok(body)
}

/// Fetches a resource and, when a public key is configured, verifies the
/// detached Ed25519 signature at the sibling `.sig` URL against the body.
/// Without a key this is a plain bounded fetch.
pub fn load_signed(
    transport: &dyn Transport,
    url: &str,
    limit: usize,
    key: Option<&VerifyingKey>,
) -> Result<Vec<u8>> {
    let body = fetch_limited(transport, url, limit)?;
    if let Some(key) = key {
        let sig_url = signature_url(url);
        let sig_bytes =
            fetch_limited(transport, &sig_url, SIGNATURE_LIMIT).map_err(|e| {
                UpdateError::Integrity {
                    url: url.to_string(),
                    detail: format!("failed to fetch detached signature: {e}"),
                }
            })?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| UpdateError::Integrity {
                url: url.to_string(),
                detail: "malformed detached signature".to_string(),
            })?;
        key.verify(&body, &signature)
            .map_err(|_| UpdateError::Integrity {
                url: url.to_string(),
                detail: "signature is invalid".to_string(),
            })?;
    }
    Ok(body)
}

/// Fetches a resource whose integrity is pinned by a parent document and
/// verifies the computed digest against the expected value. `expected_hex`
/// is canonical hex — wire-form values go through
/// [`HashFunction::normalize`] first.
pub fn load_hash_verified(
    transport: &dyn Transport,
    url: &str,
    limit: usize,
    func: HashFunction,
    expected_hex: &str,
) -> Result<Vec<u8>> {
    let body = fetch_limited(transport, url, limit)?;
    let expected = expected_hex.trim().to_ascii_lowercase();
    let actual = func.digest_hex(&body);
    if actual != expected {
        return Err(UpdateError::Integrity {
            url: url.to_string(),
            detail: format!(
                "expected {}, got {}",
                func.doublet(&expected),
                func.doublet(&actual)
            ),
        });
    }
    Ok(body)
}

/// [`load_signed`] into a parsed [`Document`].
pub fn load_signed_document(
    transport: &dyn Transport,
    url: &str,
    limit: usize,
    key: Option<&VerifyingKey>,
) -> Result<Document> {
    let body = load_signed(transport, url, limit, key)?;
    Document::parse(url, &body)
}

/// [`load_hash_verified`] into a parsed [`Document`].
pub fn load_verified_document(
    transport: &dyn Transport,
    url: &str,
    limit: usize,
    func: HashFunction,
    expected_hex: &str,
) -> Result<Document> {
    let body = load_hash_verified(transport, url, limit, func, expected_hex)?;
    Document::parse(url, &body)
}

/// Where a resource's detached signature lives.
pub(crate) fn signature_url(url: &str) -> String {
    format!("{url}.sig")
}

/// Resolves a possibly-relative reference against the URL of the document
/// that mentioned it. Backslashes normalize to forward slashes first.
pub(crate) fn resolve_relative(base: &str, reference: &str) -> String {
    let reference = reference.replace('\\', "/");
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference;
    }
    if let Some(rest) = reference.strip_prefix('/') {
        if let Some(origin) = origin_of(base) {
            return format!("{origin}/{rest}");
        }
    }
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], reference),
        None => reference,
    }
}

/// The `scheme://authority` prefix of a URL, if it has one.
fn origin_of(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")?;
    let authority_end = url[scheme_end + 3..]
        .find('/')
        .map(|i| scheme_end + 3 + i)
        .unwrap_or(url.len());
    Some(&url[..authority_end])
}

/// Guards custom download URLs against scheme downgrades: http(s) content
/// may only reference http(s) sources, while file-scheme bases may also
/// promote to http(s). A rejected URL is discarded with a warning so the
/// caller can fall back to other source information.
pub(crate) fn check_scheme(base: &str, url: &str) -> Option<String> {
    let from_file = base.starts_with("file:");
    let to_http = url.starts_with("http://") || url.starts_with("https://");
    let ok = if from_file {
        to_http || url.starts_with("file:")
    } else {
        to_http
    };
    if ok {
        Some(url.to_string())
    } else {
        warn!(url, "ignoring custom URL with bad scheme");
        None
    }
}
