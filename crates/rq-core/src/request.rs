use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Request headers keep insertion order and unique keys. Re-adding an
/// existing key replaces the value in place.
pub type HeaderMap = IndexMap<String, String>;

/// The pending request a pre-request script may rewrite before transmission.
/// During a tests run the request is still visible but the response has
/// already been received, so mutations are informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestState {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: HeaderMap,
    #[serde(default)]
    pub body: Option<String>,
}

impl RequestState {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A received response, read-only from script code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseState {
    pub status_code: u16,
    pub status_text: String,
    pub response_time_ms: f64,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_keep_insertion_order_with_unique_keys() {
        let mut request = RequestState::new("GET", "https://api.example.com/v1/items");
        request
            .headers
            .insert("X-First".to_string(), "1".to_string());
        request
            .headers
            .insert("X-Second".to_string(), "2".to_string());
        request
            .headers
            .insert("X-First".to_string(), "replaced".to_string());

        let keys = request.headers.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["X-First".to_string(), "X-Second".to_string()]);
        assert_eq!(
            request.headers.get("X-First"),
            Some(&"replaced".to_string())
        );
    }

    #[test]
    fn request_state_round_trips_through_json() {
        let mut request = RequestState::new("POST", "https://api.example.com/login");
        request
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        request.body = Some(r#"{"user":"ada"}"#.to_string());

        let json = serde_json::to_string(&request).expect("serialize request");
        let parsed: RequestState = serde_json::from_str(&json).expect("parse request");
        assert_eq!(parsed, request);
    }

    #[test]
    fn response_state_fields_use_camel_case_wire_names() {
        let response = ResponseState {
            status_code: 200,
            status_text: "OK".to_string(),
            response_time_ms: 12.5,
            headers: BTreeMap::new(),
            body: String::new(),
        };
        let json = serde_json::to_value(&response).expect("serialize response");
        assert!(json.get("statusCode").is_some());
        assert!(json.get("responseTimeMs").is_some());
    }
}
