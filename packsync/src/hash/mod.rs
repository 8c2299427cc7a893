//! Hash algorithm registry and content identity.
//!
//! File identity is never derived from content inspection: a file *is* its
//! verified digest, written as a "doublet" string `"<func>:<hex>"`. That
//! string is the only representation that crosses the persistence boundary,
//! so it must stay stable across runs, case handling, and locales.

pub mod murmur2;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Result, UpdateError};

/// A supported hash algorithm.
///
/// Parsing is case-insensitive; canonical names are lowercase. An unknown
/// name is rejected loudly with [`UpdateError::UnsupportedFormat`] rather
/// than skipping integrity checking.
///
/// # Example
///
/// ```
/// use packsync::hash::HashFunction;
///
/// let func = HashFunction::parse("SHA256").unwrap();
/// assert_eq!(func, HashFunction::Sha256);
/// assert_eq!(func.name(), "sha256");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashFunction {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    /// CurseForge's whitespace-stripped 32-bit MurmurHash2. Wire values are
    /// decimal strings and get normalized to hex before any comparison.
    Murmur2,
}

impl HashFunction {
    /// Parses an algorithm name from a manifest, case-insensitively.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            "murmur2" => Ok(Self::Murmur2),
            other => Err(UpdateError::UnsupportedFormat(format!(
                "unknown hash function `{other}`"
            ))),
        }
    }

    /// Canonical lowercase name, as persisted in doublet strings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Murmur2 => "murmur2",
        }
    }

    /// Starts an incremental digest.
    pub fn hasher(&self) -> Hasher {
        match self {
            Self::Md5 => Hasher::Md5(Md5::new()),
            Self::Sha1 => Hasher::Sha1(Sha1::new()),
            Self::Sha256 => Hasher::Sha256(Sha256::new()),
            Self::Sha384 => Hasher::Sha384(Sha384::new()),
            Self::Sha512 => Hasher::Sha512(Sha512::new()),
            Self::Murmur2 => Hasher::Murmur2(murmur2::Murmur2::new()),
        }
    }

    /// Digests a complete buffer to canonical hex.
    pub fn digest_hex(&self, data: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize_hex()
    }

    /// Normalizes a wire-form hash value to its canonical persisted form.
    ///
    /// Murmur2 values arrive as decimal strings; everything else is hex that
    /// only needs lowercasing.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        match self {
            Self::Murmur2 => murmur2::dec_to_hex(raw),
            _ => Ok(raw.trim().to_ascii_lowercase()),
        }
    }

    /// The persisted identity string for a digest under this algorithm.
    pub fn doublet(&self, hex: &str) -> String {
        format!("{}:{}", self.name(), hex)
    }
}

/// Splits a persisted doublet string back into its parts.
pub fn parse_doublet(doublet: &str) -> Result<(HashFunction, String)> {
    let (name, hex) = doublet.split_once(':').ok_or_else(|| {
        UpdateError::Malformed(format!("`{doublet}` is not a <func>:<hex> doublet"))
    })?;
    Ok((HashFunction::parse(name)?, hex.to_ascii_lowercase()))
}

/// Incremental digest state for any supported algorithm.
pub enum Hasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
    Murmur2(murmur2::Murmur2),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Murmur2(h) => h.update(data),
        }
    }

    /// Finishes the digest, rendering canonical hex.
    ///
    /// Murmur2 renders unpadded, matching the decimal-normalization path in
    /// [`HashFunction::normalize`].
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Md5(h) => hex::encode(h.finalize()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha384(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
            Self::Murmur2(h) => format!("{:x}", h.finalize()),
        }
    }
}
