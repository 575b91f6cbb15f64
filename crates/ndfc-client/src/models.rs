//! NDFC response envelope and request verbs
//!
//! Every controller call, real or simulated, is normalized into a
//! [`ControllerResponse`] so the reconciler can classify it uniformly.

use crate::error::NdfcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// HTTP verbs the controller API is driven with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = NdfcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            other => Err(NdfcError::InvalidVerb(other.to_string())),
        }
    }
}

/// Normalized controller response envelope
///
/// `ERROR` and `MESSAGE` are optional because the controller omits them on
/// some successful writes; absence and presence are classified differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerResponse {
    #[serde(rename = "RETURN_CODE")]
    pub return_code: u16,

    #[serde(rename = "MESSAGE", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(rename = "ERROR", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(rename = "METHOD", default)]
    pub method: String,

    #[serde(rename = "REQUEST_PATH", default)]
    pub request_path: String,

    #[serde(rename = "DATA", default)]
    pub data: Value,

    #[serde(rename = "CHECK_MODE", default, skip_serializing_if = "std::ops::Not::not")]
    pub check_mode: bool,
}

impl ControllerResponse {
    /// Build a plain `200 OK` response carrying `data`
    pub fn ok(verb: Verb, path: impl Into<String>, data: Value) -> Self {
        Self {
            return_code: 200,
            message: Some("OK".to_string()),
            error: None,
            method: verb.to_string(),
            request_path: path.into(),
            data,
            check_mode: false,
        }
    }

    /// Build an error response with the given code, message and error text
    pub fn error(
        verb: Verb,
        path: impl Into<String>,
        return_code: u16,
        message: impl Into<String>,
        error: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            return_code,
            message: Some(message.into()),
            error: Some(error.into()),
            method: verb.to_string(),
            request_path: path.into(),
            data,
            check_mode: false,
        }
    }

    /// `MESSAGE`, or the empty string when absent
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    /// `ERROR`, or the empty string when absent
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }

    pub fn is_ok(&self) -> bool {
        self.return_code == 200 && self.message() == "OK"
    }

    pub fn is_not_found(&self) -> bool {
        self.return_code == 404 && self.message() == "Not Found"
    }

    /// True when `needle` occurs anywhere in the rendered envelope
    pub fn contains(&self, needle: &str) -> bool {
        if self.message().contains(needle) || self.error_text().contains(needle) {
            return true;
        }
        match &self.data {
            Value::String(s) => s.contains(needle),
            Value::Null => false,
            other => other.to_string().contains(needle),
        }
    }

    /// Envelope as JSON, for result reporting
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Classification of a single `RestSend` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    /// Only reported for GET
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<bool>,
    /// Only reported for POST/PUT/DELETE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verb_parse_is_case_insensitive() {
        assert_eq!("get".parse::<Verb>().unwrap(), Verb::Get);
        assert_eq!("Delete".parse::<Verb>().unwrap(), Verb::Delete);
        assert!(matches!("PATCH".parse::<Verb>(), Err(NdfcError::InvalidVerb(_))));
    }

    #[test]
    fn test_envelope_deserializes_controller_shape() {
        let raw = json!({
            "RETURN_CODE": 404,
            "MESSAGE": "Not Found",
            "METHOD": "GET",
            "REQUEST_PATH": "/x",
            "DATA": {"error": "missing"}
        });
        let resp: ControllerResponse = serde_json::from_value(raw).unwrap();
        assert!(resp.is_not_found());
        assert!(resp.error.is_none());
        assert!(resp.contains("missing"));
    }

    #[test]
    fn test_contains_searches_string_data() {
        let resp = ControllerResponse::ok(
            Verb::Post,
            "/attachments",
            json!("VLAN 2000 is in use already by vrf v9"),
        );
        assert!(resp.contains("is in use already"));
        assert!(!resp.contains("PENDING"));
    }
}
