//! NdfcClient trait for mocking
//!
//! This trait abstracts the single-request transport so the reconciler can be
//! driven against the in-memory mock controller in unit tests.

use crate::error::NdfcError;
use crate::models::{ControllerResponse, Verb};
use serde_json::Value;

/// Trait for a single controller round trip
///
/// Implementations perform exactly one request and normalize the outcome into
/// a [`ControllerResponse`]. Non-2xx replies are *not* errors at this level;
/// only transport failures (connect, TLS, decode) are.
#[async_trait::async_trait]
pub trait NdfcClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Issue `verb` against `path`, with an optional JSON body
    async fn send(
        &self,
        verb: Verb,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<ControllerResponse, NdfcError>;
}
