//! NDFC REST API Client
//!
//! A Rust client library for driving the Cisco NDFC/DCNM top-down VRF API.
//! Provides the response envelope, the per-version path table and a retrying
//! send primitive.
//!
//! # Example
//!
//! ```no_run
//! use ndfc_client::{ApiPaths, ApiVersion, NdfcClient, RestSend, Verb};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = NdfcClient::new(
//!     "https://ndfc.example.net".to_string(),
//!     "your-api-token".to_string(),
//!     false,
//! )?;
//! let paths = ApiPaths::for_version(ApiVersion::V12);
//!
//! let mut rest = RestSend::new(&client);
//! rest.verb(Verb::Get).path(paths.vrfs("fabric1"));
//! let response = rest.commit().await?;
//! println!("{} VRFs", response.data.as_array().map_or(0, Vec::len));
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Envelope normalization**: every call yields `{RETURN_CODE, MESSAGE, ERROR, DATA, ...}`
//! - **Retry Logic**: `RestSend` retries until success or timeout
//! - **Check mode**: simulated responses without contacting the controller
//! - **Mocking**: in-memory controller behind the `test-util` feature

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod ndfc_trait;
pub mod paths;
pub mod rest_send;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::NdfcClient;
pub use error::NdfcError;
pub use models::{ControllerResponse, SendResult, Verb};
pub use ndfc_trait::NdfcClientTrait;
pub use paths::{ApiPaths, ApiVersion};
pub use rest_send::RestSend;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockNdfcClient;
