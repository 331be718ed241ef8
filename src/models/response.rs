//! Outbound response: status, headers and a JSON body string.

use crate::{errors::IntakeError, models::book::Book};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

const ALLOWED_HEADERS: &str =
    "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token";
const ALLOWED_METHODS: &str = "GET,PUT,POST,DELETE,OPTIONS";

/// Gateway-style response object. Serializes as
/// `{"statusCode": 201, "headers": {...}, "body": "..."}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntakeResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl IntakeResponse {
    /// 201 carrying the stored record and the full CORS preflight headers.
    pub fn created(book: &Book) -> Result<Self, serde_json::Error> {
        let mut response = Self::json(StatusCode::CREATED, serde_json::to_string(book)?);
        response.headers.insert(
            "Access-Control-Allow-Headers".into(),
            ALLOWED_HEADERS.into(),
        );
        response.headers.insert(
            "Access-Control-Allow-Methods".into(),
            ALLOWED_METHODS.into(),
        );
        Ok(response)
    }

    pub fn found(book: &Book) -> Result<Self, serde_json::Error> {
        Ok(Self::json(StatusCode::OK, serde_json::to_string(book)?))
    }

    /// `{"error": message}` with the given status.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        let body = json!({ "error": message.into() }).to_string();
        Self::json(status, body)
    }

    pub fn from_error(err: &IntakeError) -> Self {
        Self::error(err.status(), err.public_message())
    }

    fn json(status: StatusCode, body: String) -> Self {
        let headers = BTreeMap::from([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ]);
        Self {
            status_code: status.as_u16(),
            headers,
            body,
        }
    }

    /// Parse the body back into JSON.
    #[cfg(test)]
    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("response body is JSON")
    }
}

impl IntoResponse for IntakeResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}
