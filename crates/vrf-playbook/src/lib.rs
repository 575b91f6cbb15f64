//! VRF playbook definitions
//!
//! Desired-state input for the NDFC VRF reconciler: which fabric to act on,
//! the reconciliation state, and the VRFs with their switch attachments.

pub mod error;
pub mod playbook;
pub mod state;
pub mod vrf;

pub use error::PlaybookError;
pub use playbook::Playbook;
pub use state::State;
pub use vrf::*;
