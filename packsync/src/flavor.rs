//! Optional-feature ("flavor") choice groups and their per-check resolution.
//!
//! A flavor group is a named set of user-selectable choices gating inclusion
//! of one or more files. Groups come from two places: declared groups in the
//! top manifest, and synthetic on/off groups invented for optional
//! descriptors that have no declared gating. Resolution is a per-check
//! procedure, not a long-lived state machine: the persisted inputs are the
//! flat set of selected choice ids plus the synthetic-group subset, and the
//! single output is the complete updated selection set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A named set of mutually exclusive user-selectable choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlavorGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub choices: Vec<FlavorChoice>,
    /// Choice id to preselect in the prompt, if any.
    pub default_choice: Option<String>,
}

impl FlavorGroup {
    /// True if any of this group's choice ids is in the given selection.
    pub fn intersects(&self, selection: &BTreeSet<String>) -> bool {
        self.choices.iter().any(|c| selection.contains(&c.id))
    }
}

/// One selectable choice within a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlavorChoice {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Whether the prompt should preselect this choice.
    pub is_default: bool,
}

/// Collaborator that presents pending groups to the user and returns the
/// complete updated selection-id set.
///
/// This is the single indefinite-wait suspension point of a check: it runs
/// human-speed, has no timeout by design, and is invoked exactly once per
/// check with the full batch of pending groups.
pub trait FlavorSelector: Send + Sync {
    fn select(
        &self,
        pending: &[FlavorGroup],
        current: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>>;
}

/// Per-check resolution rules for group defaults and pending status.
#[derive(Debug)]
pub(crate) struct Resolver {
    selected: BTreeSet<String>,
    force_reselect: bool,
}

impl Resolver {
    pub fn new(selected: BTreeSet<String>, force_reselect: bool) -> Self {
        Self {
            selected,
            force_reselect,
        }
    }

    /// Whether a group already has a standing decision and can be dropped
    /// from the pending batch. A forced reselect re-offers everything.
    pub fn is_resolved(&self, group: &FlavorGroup) -> bool {
        !self.force_reselect && group.intersects(&self.selected)
    }

    /// Applies default precedence to a declared group's choices:
    /// a forced reselect prefers the prior persisted selection, otherwise
    /// the manifest-declared default id wins.
    pub fn apply_defaults(&self, group: &mut FlavorGroup, declared_default: Option<&str>) {
        group.default_choice = None;
        for choice in &mut group.choices {
            choice.is_default = if self.force_reselect {
                self.selected.contains(&choice.id)
            } else {
                declared_default == Some(choice.id.as_str())
            };
            if choice.is_default {
                group.default_choice = Some(choice.id.clone());
            }
        }
    }

    /// Synthesizes the two-choice on/off group for an optional component
    /// with no declared gating. Default precedence mirrors
    /// [`Resolver::apply_defaults`], substituting the descriptor's own
    /// declared default for the manifest default.
    pub fn toggle_group(
        &self,
        component: &str,
        name: &str,
        description: &str,
        default_on: bool,
    ) -> FlavorGroup {
        let on_id = format!("{component}_on");
        let off_id = format!("{component}_off");
        let on = if self.force_reselect {
            self.selected.contains(&on_id)
        } else {
            default_on
        };
        FlavorGroup {
            id: component.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            default_choice: Some(if on { on_id.clone() } else { off_id.clone() }),
            choices: vec![
                FlavorChoice {
                    id: on_id,
                    name: "On".to_string(),
                    description: String::new(),
                    is_default: on,
                },
                FlavorChoice {
                    id: off_id,
                    name: "Off".to_string(),
                    description: String::new(),
                    is_default: !on,
                },
            ],
        }
    }
}
