//! Controller-specific error types.
//!
//! This module defines error types specific to the VRF reconciler that are
//! not covered by the client and playbook crates.

use ndfc_client::NdfcError;
use serde_json::Value;
use thiserror::Error;
use vrf_playbook::PlaybookError;

/// Errors that can occur while reconciling VRFs.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Controller API or transport error
    #[error("NDFC error: {0}")]
    Ndfc(#[from] NdfcError),

    /// Playbook could not be read or is invalid
    #[error("Playbook error: {0}")]
    Playbook(#[from] PlaybookError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A VRF already exists with a different segment id
    #[error("vrf_id for vrf {vrf} cannot be updated from {have} to {want}")]
    VrfIdImmutable { vrf: String, have: u64, want: u64 },

    /// VRF-LITE requested where the switch cannot provide it
    #[error("VRF LITE not allowed: {0}")]
    VrfLiteNotAllowed(String),

    /// A deployed network still uses the VRF
    #[error(
        "Network attachments associated with vrf {vrf} must be removed prior to deleting the vrf (switch {switch})"
    )]
    NetworkAttachmentsPresent { vrf: String, switch: String },

    /// VRFs left out of the delete because their attachments are out of sync
    #[error("Deletion of vrfs {} has failed", .0.join(","))]
    DeleteFailed(Vec<String>),

    /// Attachments never settled before the delete deadline
    #[error("Timed out after {seconds}s waiting for vrf {vrf} to become deletable")]
    DeleteWaitTimeout { vrf: String, seconds: u64 },

    /// Segment id or VLAN could not be obtained from the controller
    #[error("Resource allocation failed: {0}")]
    ResourceAllocation(String),

    /// Switch IP not present in the fabric inventory
    #[error("Switch {0} not found in fabric inventory")]
    SwitchNotFound(String),

    /// A write was refused; `rollback` holds the rollback outcome when one ran
    #[error("Failed to push changes to the controller: {response}")]
    PushFailed {
        response: Value,
        rollback: Option<String>,
    },

    /// A read against the controller failed
    #[error("Controller query failed: {0}")]
    Query(String),
}
