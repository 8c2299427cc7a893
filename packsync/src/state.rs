//! Persisted install-state tree.
//!
//! The state tree is the sole record of what a previous check installed. It
//! is treated copy-on-write: a check clones the tree up front, mutates only
//! the clone, and hands the clone back inside the produced plan. The caller
//! commits it atomically after the plan applies cleanly; a crashed or
//! aborted check therefore leaves the persisted original untouched.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};
use crate::flavor::FlavorGroup;
use crate::version::Version;

/// Current on-disk format tag.
pub const STATE_FORMAT: u32 = 1;

/// Everything a check persists between runs.
///
/// All maps are ordered so serialized output is deterministic; all paths are
/// unique and forward-slash normalized; every identity value is a doublet
/// string `"<func>:<hex>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// On-disk format version of this tree.
    pub format: u32,

    /// Version installed by the last successful check, if any.
    pub current_version: Option<Version>,

    /// Flat set of globally selected flavor-choice ids.
    pub selected_flavors: BTreeSet<String>,

    /// Pack-format specific bookkeeping.
    pub pack: PackState,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            format: STATE_FORMAT,
            current_version: None,
            selected_flavors: BTreeSet::new(),
            pack: PackState::default(),
        }
    }
}

/// Per-pack bookkeeping: what the last check saw and decided.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackState {
    /// Identity doublet of the last fully processed index document.
    pub last_index_identity: Option<String>,

    /// Installed path -> identity doublet.
    pub last_state: BTreeMap<String, String>,

    /// Descriptor path -> identity doublet of the descriptor document
    /// itself, used to skip refetching unchanged descriptors.
    pub metafile_state: BTreeMap<String, String>,

    /// Descriptor path -> target path its file was installed to.
    pub metafile_files: BTreeMap<String, String>,

    /// Synthetic on/off groups invented for optional descriptors, keyed by
    /// component name. Rebuilt from scratch every run; a component that
    /// disappeared takes its group with it.
    pub synthetic_flavor_groups: BTreeMap<String, FlavorGroup>,
}

impl PersistedState {
    /// A fresh tree for a first run.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no prior install record exists.
    pub fn is_bootstrapping(&self) -> bool {
        self.pack.last_index_identity.is_none()
    }

    /// Deserializes a tree previously produced by [`PersistedState::to_json`].
    /// Unknown fields are tolerated for forward compatibility.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| UpdateError::Malformed(format!("persisted state: {e}")))
    }

    /// Serializes the tree for the caller's persistence layer.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| UpdateError::Malformed(format!("persisted state: {e}")))
    }
}
