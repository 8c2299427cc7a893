//! Error types for update checking.

use thiserror::Error;

/// Result type for update-check operations.
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Errors that can occur while computing an update plan.
///
/// A failed concurrent fetch batch propagates only the first-observed
/// failure; sibling tasks are cancelled, not reported. A declined update
/// confirmation is not an error and never surfaces here.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// A fetch exceeded its byte budget.
    #[error("{url} is larger than {limit} bytes, refusing to continue downloading")]
    TooLarge { url: String, limit: usize },

    /// A hash or signature did not match its pinned value.
    #[error("integrity check failed for {url}: {detail}")]
    Integrity { url: String, detail: String },

    /// The resource does not exist (HTTP 404/410). Distinguished from
    /// [`UpdateError::Transport`] so callers can treat missing optional
    /// resources differently from hard failures.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// A non-2xx response other than not-found, or a connection failure.
    #[error("transport failure for {url}: {detail}")]
    Transport { url: String, detail: String },

    /// An unknown pack format, hash function, or download mode identifier.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A document was syntactically valid but structurally unusable.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// The flavor selection collaborator failed to produce a selection.
    #[error("flavor selection failed: {0}")]
    Selection(String),
}
