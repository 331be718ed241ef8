//! Inbound request shape shared by the native HTTP route and the gateway
//! event route.

use axum::http::HeaderMap;
use bytes::Bytes;
use serde_json::{Map, Value};

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Raw request payload as it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// UTF-8 text, or base64 text when the request is flagged as encoded.
    Text(String),
    /// Bytes read straight off the wire.
    Binary(Bytes),
    /// A gateway event whose `body` is already a JSON value.
    Structured(Value),
}

impl RequestBody {
    fn is_empty(&self) -> bool {
        match self {
            RequestBody::Text(text) => text.is_empty(),
            RequestBody::Binary(bytes) => bytes.is_empty(),
            RequestBody::Structured(value) => match value {
                Value::Null => true,
                Value::Object(map) => map.is_empty(),
                Value::Array(items) => items.is_empty(),
                _ => false,
            },
        }
    }
}

/// One "create book" request, independent of how it reached us.
#[derive(Debug, Clone, Default)]
pub struct IntakeRequest {
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub is_base64_encoded: bool,
    /// Top-level fields of a gateway event, used for the implicit-body shim.
    pub top_level: Map<String, Value>,
}

impl IntakeRequest {
    /// Request received directly over HTTP.
    pub fn from_http(headers: &HeaderMap, body: Bytes) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            headers,
            body: Some(RequestBody::Binary(body)),
            is_base64_encoded: false,
            top_level: Map::new(),
        }
    }

    /// Request delivered as a gateway event:
    /// `{"headers": {...}, "body": "...", "isBase64Encoded": bool, ...}`.
    ///
    /// Every field is optional; anything of an unexpected type is ignored.
    pub fn from_event(event: Value) -> Self {
        let Value::Object(top_level) = event else {
            return Self::default();
        };

        let headers = match top_level.get("headers") {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(name, value)| value.as_str().map(|v| (name.clone(), v.to_string())))
                .collect(),
            _ => Vec::new(),
        };

        let body = match top_level.get("body") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(RequestBody::Text(text.clone())),
            Some(other) => Some(RequestBody::Structured(other.clone())),
        };

        let is_base64_encoded = top_level
            .get("isBase64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            headers,
            body,
            is_base64_encoded,
            top_level,
        }
    }

    /// Case-insensitive header lookup. Empty values count as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }

    /// Declared content type, `application/json` when none is given.
    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// The body, or `None` when it is missing or empty.
    pub fn non_empty_body(&self) -> Option<&RequestBody> {
        self.body.as_ref().filter(|body| !body.is_empty())
    }

    /// Whether the event itself looks like a book (`id` and `name` at the
    /// top level). Only callers that omit the body envelope rely on this.
    pub fn has_top_level_book(&self) -> bool {
        self.top_level.contains_key("id") && self.top_level.contains_key("name")
    }
}
