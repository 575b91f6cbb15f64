//! Reconciliation state requested by a playbook

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the reconciler should make of the difference between playbook and controller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Create and update what the playbook lists; leave everything else alone
    #[default]
    Merged,
    /// Like merged, but listed VRFs lose attachments the playbook omits
    Replaced,
    /// Like replaced, and VRFs missing from the playbook are removed
    Overridden,
    /// Remove the listed VRFs, or every VRF when the list is empty
    Deleted,
    /// Read-only report of controller state
    Query,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Merged => "merged",
            State::Replaced => "replaced",
            State::Overridden => "overridden",
            State::Deleted => "deleted",
            State::Query => "query",
        }
    }

    /// States that only need the VRF name of each entry
    pub fn name_only(&self) -> bool {
        matches!(self, State::Deleted | State::Query)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
