//! Desired-vs-installed diffing.
//!
//! The builder starts by assuming everything previously installed is up for
//! deletion, then walks the desired file set: every visited path escapes
//! deletion, paths already in their desired state produce no directive, and
//! whatever is left at the end becomes a delete. Download sources resolve
//! lazily so an unresolvable source on an unchanged file costs nothing.

use std::collections::{BTreeMap, BTreeSet};

use super::{DownloadSource, FilePlan, FileState};
use crate::error::Result;

/// Accumulates one check's worth of per-path decisions.
pub(crate) struct PlanBuilder {
    last_state: BTreeMap<String, String>,
    expected: BTreeMap<String, FileState>,
    files: BTreeMap<String, FilePlan>,
    deletion_candidates: BTreeSet<String>,
    post_state: BTreeMap<String, FileState>,
}

/// What the walk produced.
pub(crate) struct DiffOutput {
    pub files: BTreeMap<String, FilePlan>,
    pub expected_state: BTreeMap<String, FileState>,
    /// Replacement `last_state` map: the old map with every touched path
    /// updated and emptied paths removed.
    pub last_state: BTreeMap<String, String>,
}

impl PlanBuilder {
    /// Seeds expected state and deletion candidates from the persisted
    /// path -> doublet map.
    pub fn new(last_state: &BTreeMap<String, String>) -> Result<Self> {
        let mut expected = BTreeMap::new();
        let mut deletion_candidates = BTreeSet::new();
        for (path, doublet) in last_state {
            expected.insert(path.clone(), FileState::from_doublet(doublet)?);
            deletion_candidates.insert(path.clone());
        }
        Ok(Self {
            last_state: last_state.clone(),
            expected,
            files: BTreeMap::new(),
            deletion_candidates,
            post_state: BTreeMap::new(),
        })
    }

    /// Keeps a path as-is without planning any work. Used for the targets
    /// of descriptors that were skipped as unchanged.
    pub fn retain(&mut self, path: &str) {
        self.deletion_candidates.remove(path);
    }

    /// Records the desired state for a path. `source` is only invoked when
    /// the path actually needs work.
    pub fn visit(
        &mut self,
        path: String,
        state: FileState,
        source: impl FnOnce() -> Result<DownloadSource>,
    ) -> Result<()> {
        self.deletion_candidates.remove(&path);
        self.post_state.insert(path.clone(), state.clone());
        match self.expected.get(&path) {
            None => {
                self.expected.insert(path.clone(), FileState::Empty);
            }
            Some(current) if *current == state => return Ok(()),
            Some(_) => {}
        }
        self.files.insert(path, FilePlan::download(state, source()?));
        Ok(())
    }

    /// Turns every remaining deletion candidate into a delete directive and
    /// folds the touched paths into the replacement `last_state`.
    pub fn finish(mut self) -> DiffOutput {
        for path in std::mem::take(&mut self.deletion_candidates) {
            self.files.insert(path.clone(), FilePlan::delete());
            self.post_state.insert(path, FileState::Empty);
        }
        let mut last_state = self.last_state;
        for (path, state) in &self.post_state {
            match state.doublet() {
                Some(doublet) => {
                    last_state.insert(path.clone(), doublet);
                }
                None => {
                    last_state.remove(path);
                }
            }
        }
        DiffOutput {
            files: self.files,
            expected_state: self.expected,
            last_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashFunction;

    fn source(url: &str) -> DownloadSource {
        DownloadSource {
            url: url.to_string(),
            hostile: false,
        }
    }

    fn sha(hex: &str) -> FileState {
        FileState::present(HashFunction::Sha256, hex.to_string())
    }

    fn last_state(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_new_file_planned_with_empty_expectation() {
        let mut builder = PlanBuilder::new(&BTreeMap::new()).unwrap();
        builder
            .visit("mods/a.jar".to_string(), sha("aa"), || Ok(source("u")))
            .unwrap();
        let out = builder.finish();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.expected_state["mods/a.jar"], FileState::Empty);
        assert_eq!(out.last_state["mods/a.jar"], "sha256:aa");
    }

    #[test]
    fn test_unchanged_file_produces_no_directive() {
        let mut builder = PlanBuilder::new(&last_state(&[("mods/a.jar", "sha256:aa")])).unwrap();
        builder
            .visit("mods/a.jar".to_string(), sha("aa"), || {
                panic!("source resolved for unchanged file")
            })
            .unwrap();
        let out = builder.finish();
        assert!(out.files.is_empty());
        assert_eq!(out.last_state["mods/a.jar"], "sha256:aa");
    }

    #[test]
    fn test_changed_file_planned_with_old_expectation() {
        let mut builder = PlanBuilder::new(&last_state(&[("mods/a.jar", "sha256:aa")])).unwrap();
        builder
            .visit("mods/a.jar".to_string(), sha("bb"), || Ok(source("u")))
            .unwrap();
        let out = builder.finish();
        assert_eq!(out.files["mods/a.jar"].state, sha("bb"));
        assert_eq!(out.expected_state["mods/a.jar"], sha("aa"));
        assert_eq!(out.last_state["mods/a.jar"], "sha256:bb");
    }

    #[test]
    fn test_unvisited_paths_become_deletes_exactly_once() {
        let mut builder = PlanBuilder::new(&last_state(&[
            ("mods/gone.jar", "sha256:aa"),
            ("mods/kept.jar", "sha256:bb"),
        ]))
        .unwrap();
        builder
            .visit("mods/kept.jar".to_string(), sha("bb"), || Ok(source("u")))
            .unwrap();
        let out = builder.finish();
        assert_eq!(out.files.len(), 1);
        assert!(out.files["mods/gone.jar"].is_delete());
        assert!(!out.last_state.contains_key("mods/gone.jar"));
        assert!(out.last_state.contains_key("mods/kept.jar"));
    }

    #[test]
    fn test_retained_path_neither_deleted_nor_planned() {
        let mut builder =
            PlanBuilder::new(&last_state(&[("mods/skip.jar", "sha256:aa")])).unwrap();
        builder.retain("mods/skip.jar");
        let out = builder.finish();
        assert!(out.files.is_empty());
        // still recorded as installed for the next run
        assert_eq!(out.last_state["mods/skip.jar"], "sha256:aa");
    }

    #[test]
    fn test_source_error_propagates_only_for_changed_files() {
        let mut builder = PlanBuilder::new(&BTreeMap::new()).unwrap();
        let err = builder.visit("mods/a.jar".to_string(), sha("aa"), || {
            Err(crate::error::UpdateError::UnsupportedFormat(
                "download mode `x`".to_string(),
            ))
        });
        assert!(err.is_err());
    }
}
