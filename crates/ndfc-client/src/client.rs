//! NDFC REST transport
//!
//! Performs one HTTP request per call and folds the HTTP outcome into the
//! controller's `{RETURN_CODE, MESSAGE, ERROR, METHOD, REQUEST_PATH, DATA}`
//! envelope.

use crate::error::NdfcError;
use crate::models::{ControllerResponse, Verb};
use crate::ndfc_trait::NdfcClientTrait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// NDFC REST client
pub struct NdfcClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for NdfcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdfcClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl NdfcClient {
    /// Create a new NDFC client
    ///
    /// # Arguments
    /// * `base_url` - Controller base URL (e.g., "https://ndfc.example.net")
    /// * `token` - Pre-issued API token, sent as a bearer token
    /// * `accept_invalid_certs` - Skip TLS verification (lab controllers with self-signed certs)
    pub fn new(base_url: String, token: String, accept_invalid_certs: bool) -> Result<Self, NdfcError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a full URL from a path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Check connectivity and token validity against the version endpoint.
    pub async fn validate_token(&self) -> Result<(), NdfcError> {
        let path = "/appcenter/Cisco/ndfc/api/about/version";
        debug!("Validating NDFC token and connectivity");

        let response = self.send(Verb::Get, path, None).await?;
        match response.return_code {
            200 => {
                debug!("Token validated successfully");
                Ok(())
            }
            401 | 403 => Err(NdfcError::Api(format!(
                "Invalid token: {} - {}",
                response.return_code,
                response.error_text()
            ))),
            code => Err(NdfcError::Api(format!(
                "Failed to validate token: {} - {}",
                code,
                response.error_text()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl NdfcClientTrait for NdfcClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        verb: Verb,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<ControllerResponse, NdfcError> {
        let url = self.build_url(path);
        match payload {
            Some(body) => debug!(
                "{} {} with body: {}",
                verb,
                url,
                serde_json::to_string(body).unwrap_or_default()
            ),
            None => debug!("{} {}", verb, url),
        }

        let builder = match verb {
            Verb::Get => self.client.get(&url),
            Verb::Post => self.client.post(&url),
            Verb::Put => self.client.put(&url),
            Verb::Delete => self.client.delete(&url),
        };
        let mut builder = builder
            .bearer_auth(&self.token)
            .header("Accept", "application/json");
        if let Some(body) = payload {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        let data = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body.clone()))
        };

        let message = status.canonical_reason().unwrap_or("").to_string();
        let error = (!status.is_success()).then(|| {
            data.get("message")
                .or_else(|| data.get("error"))
                .and_then(Value::as_str)
                .map_or_else(|| body.clone(), str::to_string)
        });

        debug!("{} {} -> {}", verb, url, status.as_u16());
        Ok(ControllerResponse {
            return_code: status.as_u16(),
            message: Some(if status.is_success() { "OK".to_string() } else { message }),
            error,
            method: verb.to_string(),
            request_path: path.to_string(),
            data,
            check_mode: false,
        })
    }
}
