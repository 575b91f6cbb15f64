//! Retrying send primitive
//!
//! `RestSend` issues one logical operation against the controller and keeps
//! retrying it until the response classifies as successful or the timeout
//! budget is spent. In check mode it never touches the transport and answers
//! with a synthesized success envelope that goes through the same
//! classification as a real one.

use crate::error::NdfcError;
use crate::models::{ControllerResponse, SendResult, Verb};
use crate::ndfc_trait::NdfcClientTrait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default retry budget in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default pause between attempts in seconds
pub const DEFAULT_SEND_INTERVAL_SECS: u64 = 5;

/// `DATA` returned for every check-mode call
pub const CHECK_MODE_DATA: &str = "[simulated-check-mode-response:Success]";

const INVALID_JSON_PREFIX: &str = "Invalid JSON response:";

/// Retrying wrapper around a single controller request
pub struct RestSend<'a> {
    client: &'a dyn NdfcClientTrait,
    verb: Option<Verb>,
    path: Option<String>,
    payload: Option<Value>,
    timeout: u64,
    send_interval: u64,
    check_mode: bool,
    unit_test: bool,
    response_current: Option<ControllerResponse>,
    result_current: Option<SendResult>,
    responses: Vec<ControllerResponse>,
    results: Vec<SendResult>,
}

impl std::fmt::Debug for RestSend<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestSend")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .field("send_interval", &self.send_interval)
            .field("check_mode", &self.check_mode)
            .field("calls", &self.responses.len())
            .finish_non_exhaustive()
    }
}

impl<'a> RestSend<'a> {
    pub fn new(client: &'a dyn NdfcClientTrait) -> Self {
        Self {
            client,
            verb: None,
            path: None,
            payload: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            send_interval: DEFAULT_SEND_INTERVAL_SECS,
            check_mode: false,
            unit_test: false,
            response_current: None,
            result_current: None,
            responses: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn verb(&mut self, verb: Verb) -> &mut Self {
        self.verb = Some(verb);
        self
    }

    /// Set the verb from its string form; unknown verbs are rejected.
    pub fn verb_str(&mut self, verb: &str) -> Result<&mut Self, NdfcError> {
        self.verb = Some(verb.parse()?);
        Ok(self)
    }

    pub fn path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = Some(path.into());
        self
    }

    /// Set or clear the request body
    pub fn payload(&mut self, payload: Option<Value>) -> &mut Self {
        self.payload = payload;
        self
    }

    pub fn timeout(&mut self, seconds: u64) -> &mut Self {
        self.timeout = seconds;
        self
    }

    pub fn send_interval(&mut self, seconds: u64) -> &mut Self {
        self.send_interval = seconds;
        self
    }

    pub fn check_mode(&mut self, check_mode: bool) -> &mut Self {
        self.check_mode = check_mode;
        self
    }

    /// Suppress sleeping between retries
    pub fn unit_test(&mut self, unit_test: bool) -> &mut Self {
        self.unit_test = unit_test;
        self
    }

    /// Response of the most recent `commit()`
    pub fn response_current(&self) -> Option<&ControllerResponse> {
        self.response_current.as_ref()
    }

    /// Classification of the most recent `commit()`
    pub fn result_current(&self) -> Option<&SendResult> {
        self.result_current.as_ref()
    }

    /// Every response returned by this instance, oldest first
    pub fn responses(&self) -> &[ControllerResponse] {
        &self.responses
    }

    /// Every classification made by this instance, oldest first
    pub fn results(&self) -> &[SendResult] {
        &self.results
    }

    /// Send the configured request, retrying until success or timeout.
    ///
    /// Returns the final response. A response that never classified as
    /// successful is still returned; inspect [`RestSend::result_current`].
    pub async fn commit(&mut self) -> Result<ControllerResponse, NdfcError> {
        let verb = self.verb.ok_or(NdfcError::MissingParameter("verb"))?;
        let path = self.path.clone().ok_or(NdfcError::MissingParameter("path"))?;

        let (response, result) = if self.check_mode {
            self.commit_check_mode(verb, &path)
        } else {
            self.commit_normal_mode(verb, &path).await?
        };

        self.response_current = Some(response.clone());
        self.result_current = Some(result);
        self.responses.push(response.clone());
        self.results.push(result);
        Ok(response)
    }

    /// Like [`RestSend::commit`], but an unsuccessful final result is an error.
    pub async fn commit_or_fail(&mut self) -> Result<ControllerResponse, NdfcError> {
        let response = self.commit().await?;
        if self.result_current.is_some_and(|r| r.success) {
            return Ok(response);
        }
        Err(NdfcError::Timeout {
            verb: response.method.clone(),
            path: response.request_path.clone(),
            timeout: self.timeout,
            message: format!("{} {}", response.return_code, response.message()),
        })
    }

    fn commit_check_mode(&self, verb: Verb, path: &str) -> (ControllerResponse, SendResult) {
        debug!("check mode: simulating {} {}", verb, path);
        let response = ControllerResponse {
            return_code: 200,
            message: Some("OK".to_string()),
            error: None,
            method: verb.to_string(),
            request_path: path.to_string(),
            data: Value::String(CHECK_MODE_DATA.to_string()),
            check_mode: true,
        };
        let result = classify(verb, &response);
        (response, result)
    }

    async fn commit_normal_mode(
        &self,
        verb: Verb,
        path: &str,
    ) -> Result<(ControllerResponse, SendResult), NdfcError> {
        let step = self.send_interval.max(1);
        let mut remaining = self.timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let sent = self.client.send(verb, path, self.payload.as_ref()).await;
            remaining = remaining.saturating_sub(step);
            let response = match sent {
                Ok(response) => response,
                Err(e) if remaining == 0 => {
                    warn!("{} {} failed after {} attempts: {}, giving up", verb, path, attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("{} {} attempt {} failed: {}, {}s left", verb, path, attempt, e, remaining);
                    if !self.unit_test {
                        tokio::time::sleep(Duration::from_secs(self.send_interval)).await;
                    }
                    continue;
                }
            };
            let result = classify(verb, &response);

            if result.success || remaining == 0 {
                if !result.success {
                    warn!(
                        "{} {} still failing after {} attempts ({} {}), giving up",
                        verb,
                        path,
                        attempt,
                        response.return_code,
                        response.message()
                    );
                }
                return Ok((strip_invalid_json(response), result));
            }

            debug!(
                "{} {} attempt {} unsuccessful ({}), {}s left",
                verb, path, attempt, response.return_code, remaining
            );
            if !self.unit_test {
                tokio::time::sleep(Duration::from_secs(self.send_interval)).await;
            }
        }
    }
}

/// Classify a response according to the verb that produced it
pub fn classify(verb: Verb, response: &ControllerResponse) -> SendResult {
    match verb {
        Verb::Get => {
            if response.is_not_found() {
                return SendResult { success: true, found: Some(false), changed: None };
            }
            let success = matches!(response.return_code, 200 | 404) && response.message() == "OK";
            SendResult { success, found: Some(success), changed: None }
        }
        Verb::Post | Verb::Put | Verb::Delete => {
            let message_ok = response.message.as_deref().is_none_or(|m| m == "OK");
            let success = response.error.is_none() && message_ok;
            SendResult { success, found: None, changed: Some(success) }
        }
    }
}

fn strip_invalid_json(mut response: ControllerResponse) -> ControllerResponse {
    if let Value::String(data) = &response.data {
        if data.contains(INVALID_JSON_PREFIX) {
            response.data = Value::String(data.replace(INVALID_JSON_PREFIX, "").trim().to_string());
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockNdfcClient;
    use crate::paths::{ApiPaths, ApiVersion};
    use serde_json::json;

    fn rest_send(client: &MockNdfcClient) -> RestSend<'_> {
        let mut rest = RestSend::new(client);
        rest.unit_test(true).timeout(20).send_interval(5);
        rest
    }

    #[tokio::test]
    async fn test_commit_without_verb_fails() {
        let client = MockNdfcClient::new("http://ndfc");
        let mut rest = rest_send(&client);
        rest.path("/x");
        let err = rest.commit().await.unwrap_err();
        assert!(matches!(err, NdfcError::MissingParameter("verb")));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_commit_without_path_fails() {
        let client = MockNdfcClient::new("http://ndfc");
        let mut rest = rest_send(&client);
        rest.verb(Verb::Get);
        assert!(matches!(rest.commit().await, Err(NdfcError::MissingParameter("path"))));
    }

    #[test]
    fn test_verb_str_rejects_unknown_verb() {
        let client = MockNdfcClient::new("http://ndfc");
        let mut rest = rest_send(&client);
        assert!(matches!(rest.verb_str("PATCH"), Err(NdfcError::InvalidVerb(_))));
    }

    #[tokio::test]
    async fn test_check_mode_never_calls_transport() {
        let client = MockNdfcClient::new("http://ndfc");
        for verb in [Verb::Get, Verb::Post, Verb::Put, Verb::Delete] {
            let mut rest = rest_send(&client);
            rest.check_mode(true).verb(verb).path("/anything").payload(Some(json!({"a": 1})));
            let response = rest.commit().await.unwrap();
            assert_eq!(response.return_code, 200);
            assert_eq!(response.data, json!(CHECK_MODE_DATA));
            assert!(response.check_mode);
            assert!(rest.result_current().unwrap().success);
        }
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let client = MockNdfcClient::new("http://ndfc");
        let failure = ControllerResponse::error(Verb::Post, "/p", 500, "Internal Server Error", "boom", Value::Null);
        client.inject(Verb::Post, "/p", failure.clone());
        client.inject(Verb::Post, "/p", failure);
        client.inject(Verb::Post, "/p", ControllerResponse::ok(Verb::Post, "/p", json!({})));

        let mut rest = rest_send(&client);
        rest.verb(Verb::Post).path("/p");
        let response = rest.commit().await.unwrap();

        assert_eq!(response.return_code, 200);
        assert_eq!(client.requests().len(), 3);
        assert_eq!(rest.result_current().unwrap().changed, Some(true));
        assert_eq!(rest.responses().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let client = MockNdfcClient::new("http://ndfc");
        client.drop_next(Verb::Get, "/vrfs");
        client.drop_next(Verb::Get, "/vrfs");

        let mut rest = rest_send(&client);
        rest.verb(Verb::Get).path(ApiPaths::for_version(ApiVersion::V12).vrfs("fabric1"));
        let response = rest.commit().await.unwrap();

        assert_eq!(response.return_code, 200);
        assert_eq!(client.requests().len(), 3);
        assert!(rest.result_current().unwrap().success);
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_when_budget_is_spent() {
        let client = MockNdfcClient::new("http://ndfc");
        for _ in 0..4 {
            client.drop_next(Verb::Delete, "/p");
        }

        let mut rest = rest_send(&client);
        rest.verb(Verb::Delete).path("/p");
        let err = rest.commit().await.unwrap_err();

        assert!(matches!(err, NdfcError::Transport(_)));
        assert_eq!(client.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_timeout_bounds_attempts() {
        let client = MockNdfcClient::new("http://ndfc");
        for _ in 0..10 {
            client.inject(
                Verb::Put,
                "/p",
                ControllerResponse::error(Verb::Put, "/p", 500, "Internal Server Error", "boom", Value::Null),
            );
        }
        let mut rest = rest_send(&client);
        rest.verb(Verb::Put).path("/p");
        let response = rest.commit().await.unwrap();

        assert_eq!(response.return_code, 500);
        // 20s budget at 5s per attempt
        assert_eq!(client.requests().len(), 4);
        assert!(!rest.result_current().unwrap().success);
        assert!(matches!(rest.commit_or_fail().await, Err(NdfcError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_get_not_found_is_success_but_not_found() {
        let client = MockNdfcClient::new("http://ndfc");
        let mut rest = rest_send(&client);
        rest.verb(Verb::Get).path("/unknown/endpoint");
        rest.commit().await.unwrap();
        let result = rest.result_current().unwrap();
        assert!(result.success);
        assert_eq!(result.found, Some(false));
        assert_eq!(client.requests().len(), 1);
    }

    #[test]
    fn test_classify_write_without_message_is_success() {
        let mut response = ControllerResponse::ok(Verb::Delete, "/p", Value::Null);
        response.message = None;
        assert_eq!(
            classify(Verb::Delete, &response),
            SendResult { success: true, found: None, changed: Some(true) }
        );
        response.error = Some("denied".to_string());
        assert!(!classify(Verb::Delete, &response).success);
    }

    #[test]
    fn test_classify_get_non_ok_message_fails() {
        let mut response = ControllerResponse::ok(Verb::Get, "/p", Value::Null);
        response.message = Some("Bad Request".to_string());
        response.return_code = 400;
        assert!(!classify(Verb::Get, &response).success);
    }

    #[test]
    fn test_strip_invalid_json_prefix() {
        let response = ControllerResponse::ok(Verb::Get, "/p", json!("Invalid JSON response: raw text"));
        assert_eq!(strip_invalid_json(response).data, json!("raw text"));
    }

    #[tokio::test]
    async fn test_cumulative_history_across_commits() {
        let client = MockNdfcClient::new("http://ndfc");
        let mut rest = rest_send(&client);
        rest.verb(Verb::Get).path("/a");
        rest.commit().await.unwrap();
        rest.path("/b");
        rest.commit().await.unwrap();
        assert_eq!(rest.responses().len(), 2);
        assert_eq!(rest.results().len(), 2);
        assert_eq!(rest.response_current().unwrap().request_path, "/b");
    }
}
