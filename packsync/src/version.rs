//! Pack version identity.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named pack version paired with a local monotonic counter.
///
/// The `name` is whatever version string the remote manifest declares and is
/// never interpreted. The `code` is local bookkeeping: it increments by one
/// each time a check produces actual work, and is never parsed from the
/// remote string. Ordering and equality consider only `code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    /// Display name declared by the remote manifest.
    pub name: String,

    /// Local monotonic counter.
    pub code: u64,
}

impl Version {
    /// Creates a version with the given name and counter.
    pub fn new(name: impl Into<String>, code: u64) -> Self {
        Self {
            name: name.into(),
            code,
        }
    }

    /// Placeholder identity used when no install record exists yet.
    pub fn bootstrap() -> Self {
        Self::new("null", 0)
    }

    /// The successor version carrying the remote manifest's declared name.
    pub fn next(&self, name: impl Into<String>) -> Self {
        Self::new(name, self.code + 1)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code.cmp(&other.code)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.code)
    }
}
