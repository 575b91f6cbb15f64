//! Playbook document
//!
//! ```yaml
//! fabric: fabric1
//! state: merged
//! config:
//!   - vrf_name: v1
//!     vrf_id: 9000
//!     attach:
//!       - ip_address: 10.0.0.1
//! ```

use crate::error::PlaybookError;
use crate::state::State;
use crate::vrf::VrfConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const MAX_VRF_ID: u64 = 16_777_214;

/// Desired state for one fabric
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Playbook {
    pub fabric: String,

    #[serde(default)]
    pub state: State,

    #[serde(default)]
    pub config: Vec<VrfConfig>,
}

impl Playbook {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PlaybookError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a playbook file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlaybookError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PlaybookError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Check the values the reconciler relies on.
    pub fn validate(&self) -> Result<(), PlaybookError> {
        if self.fabric.trim().is_empty() {
            return Err(PlaybookError::Invalid("fabric must not be empty".to_string()));
        }
        if self.config.is_empty() && matches!(self.state, State::Merged | State::Replaced) {
            return Err(PlaybookError::Invalid(format!(
                "config is required for state {}",
                self.state
            )));
        }

        let mut names = HashSet::new();
        for vrf in &self.config {
            if vrf.vrf_name.trim().is_empty() {
                return Err(PlaybookError::Invalid("vrf_name must not be empty".to_string()));
            }
            if !names.insert(vrf.vrf_name.as_str()) {
                return Err(PlaybookError::Invalid(format!(
                    "vrf_name {} is listed more than once",
                    vrf.vrf_name
                )));
            }
            if self.state.name_only() {
                continue;
            }
            if let Some(vlan) = vrf.vlan_id {
                if !(2..=4094).contains(&vlan) {
                    return Err(PlaybookError::Invalid(format!(
                        "vlan_id {} for vrf {} is outside 2-4094",
                        vlan, vrf.vrf_name
                    )));
                }
            }
            if let Some(id) = vrf.vrf_id {
                if !(1..=MAX_VRF_ID).contains(&id) {
                    return Err(PlaybookError::Invalid(format!(
                        "vrf_id {} for vrf {} is outside 1-{}",
                        id, vrf.vrf_name, MAX_VRF_ID
                    )));
                }
            }
            if let Some(attach) = &vrf.attach {
                let mut ips = HashSet::new();
                for entry in attach {
                    if !ips.insert(entry.ip_address.as_str()) {
                        return Err(PlaybookError::Invalid(format!(
                            "switch {} is attached to vrf {} more than once",
                            entry.ip_address, vrf.vrf_name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
