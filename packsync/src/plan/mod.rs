//! Update plans and the executor contract.
//!
//! A plan is the complete, self-contained answer to "what has to happen for
//! local state to converge on remote state": per-path download or delete
//! directives, the state each path is expected to be in beforehand (so the
//! executor can detect local drift), and the replacement persisted-state
//! tree the caller commits once everything applied cleanly.

mod diff;

pub(crate) use diff::PlanBuilder;

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};

use crate::error::{Result, UpdateError};
use crate::hash::{self, HashFunction, Hasher};
use crate::state::PersistedState;
use crate::version::Version;

/// The verified identity of one file.
///
/// Identity is the verified digest, nothing else: equality considers only
/// the hash function and hex value, with size carried as advisory metadata.
/// [`FileState::Empty`] is the distinguished "should not exist" state.
///
/// # Example
///
/// ```
/// use packsync::hash::HashFunction;
/// use packsync::plan::FileState;
///
/// let a = FileState::present(HashFunction::Sha256, "aa".to_string());
/// assert_eq!(a.doublet().as_deref(), Some("sha256:aa"));
/// assert_ne!(a, FileState::Empty);
/// ```
#[derive(Debug, Clone)]
pub enum FileState {
    /// The path should not exist.
    Empty,
    /// The path should hold content with this digest.
    Present {
        func: HashFunction,
        hex: String,
        /// Expected byte count, when known. Informational only.
        size: Option<u64>,
    },
}

impl FileState {
    /// A present state with unknown size. `hex` must be canonical
    /// (normalized) form.
    pub fn present(func: HashFunction, hex: String) -> Self {
        Self::Present {
            func,
            hex,
            size: None,
        }
    }

    /// Reconstructs a state from its persisted doublet string.
    pub fn from_doublet(doublet: &str) -> Result<Self> {
        let (func, hex) = hash::parse_doublet(doublet)?;
        Ok(Self::present(func, hex))
    }

    /// The persisted identity string, or `None` for [`FileState::Empty`].
    pub fn doublet(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Present { func, hex, .. } => Some(func.doublet(hex)),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl PartialEq for FileState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (
                Self::Present {
                    func: f1, hex: h1, ..
                },
                Self::Present {
                    func: f2, hex: h2, ..
                },
            ) => f1 == f2 && h1 == h2,
            _ => false,
        }
    }
}

impl Eq for FileState {}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.doublet() {
            Some(doublet) => write!(f, "{doublet}"),
            None => write!(f, "(absent)"),
        }
    }
}

/// Where a file downloads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSource {
    pub url: String,
    /// Whether the transport must disguise the request as browser traffic.
    pub hostile: bool,
}

/// One directive in a plan: bring the path to `state`, downloading from
/// `source` when one is given. An [`FileState::Empty`] state with no source
/// is a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlan {
    pub state: FileState,
    pub source: Option<DownloadSource>,
}

impl FilePlan {
    pub fn download(state: FileState, source: DownloadSource) -> Self {
        Self {
            state,
            source: Some(source),
        }
    }

    pub fn delete() -> Self {
        Self {
            state: FileState::Empty,
            source: None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.state.is_empty() && self.source.is_none()
    }
}

/// Everything an executor needs to converge local state, plus the
/// replacement persisted tree to commit afterwards.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    /// True when no prior install record existed.
    pub bootstrapping: bool,

    /// Path -> directive. Paths not present here are already correct.
    pub files: BTreeMap<String, FilePlan>,

    /// Path -> the state this check believed the path was in. The executor
    /// compares reality against this before touching a path, so silent
    /// local edits surface as drift instead of being overwritten.
    pub expected_state: BTreeMap<String, FileState>,

    /// The full replacement persisted-state tree. Committed by the caller
    /// only after the plan applied; the previous tree is never mutated.
    pub new_state: PersistedState,
}

/// Result of one update check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub from: Version,
    pub to: Version,
    /// `None` means nothing should be applied — either already up to date
    /// (`from == to`) or the update was declined (`from != to`).
    pub plan: Option<UpdatePlan>,
}

impl CheckOutcome {
    /// Nothing changed remotely; no work to do.
    pub(crate) fn up_to_date(version: Version) -> Self {
        Self {
            from: version.clone(),
            to: version,
            plan: None,
        }
    }

    /// True when this outcome carries applicable work.
    pub fn has_work(&self) -> bool {
        self.plan.is_some()
    }
}

/// Contract for the collaborator that applies a plan to disk.
///
/// An implementation must: check each path against
/// [`UpdatePlan::expected_state`] before replacing it; stream every download
/// through hash/size verification (see [`VerifyingReader`]) and pass the
/// directive's `hostile` flag to its transport; and commit
/// [`UpdatePlan::new_state`] only after every directive applied.
pub trait PlanExecutor {
    fn apply(&self, plan: &UpdatePlan) -> Result<()>;
}

/// Streams bytes while enforcing an exact size and digest.
///
/// Wrap the transport stream, copy through it, then call
/// [`VerifyingReader::finish`]: an overread fails mid-copy, an underread or
/// digest mismatch fails at finish. Either way no unverified byte count is
/// ever reported as success.
pub struct VerifyingReader<R> {
    inner: R,
    hasher: Option<Hasher>,
    expected_hex: String,
    expected_size: Option<u64>,
    context: String,
    read: u64,
}

impl<R: Read> VerifyingReader<R> {
    /// `expected_hex` must be canonical (normalized) form.
    pub fn new(
        inner: R,
        func: HashFunction,
        expected_hex: &str,
        expected_size: Option<u64>,
        context: &str,
    ) -> Self {
        Self {
            inner,
            hasher: Some(func.hasher()),
            expected_hex: expected_hex.to_ascii_lowercase(),
            expected_size,
            context: context.to_string(),
            read: 0,
        }
    }

    /// Verifies the total size and digest after the stream is exhausted.
    /// Returns the byte count on success.
    pub fn finish(mut self) -> Result<u64> {
        if let Some(size) = self.expected_size {
            if self.read != size {
                return Err(UpdateError::Integrity {
                    url: self.context,
                    detail: format!("expected {size} bytes, got {}", self.read),
                });
            }
        }
        let actual = self
            .hasher
            .take()
            .expect("hasher consumed before finish")
            .finalize_hex();
        if actual != self.expected_hex {
            return Err(UpdateError::Integrity {
                url: self.context,
                detail: format!("expected digest {}, got {actual}", self.expected_hex),
            });
        }
        Ok(self.read)
    }
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.read += n as u64;
            if let Some(size) = self.expected_size {
                if self.read > size {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "{}: expected {size} bytes, got at least {}",
                            self.context, self.read
                        ),
                    ));
                }
            }
            if let Some(hasher) = self.hasher.as_mut() {
                hasher.update(&buf[..n]);
            }
        }
        Ok(n)
    }
}
