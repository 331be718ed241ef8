//! HTTP handlers for book intake.
//! Both entry points feed the same `IntakeService::handle`; they differ only
//! in how the request reaches us and how the response is framed.

use crate::{
    models::{request::IntakeRequest, response::IntakeResponse},
    services::intake_service::IntakeService,
};
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use bytes::Bytes;
use serde_json::Value;

/// `POST /books` — plain HTTP request; the handler's response is returned as-is.
pub async fn create_book(
    State(service): State<IntakeService>,
    headers: HeaderMap,
    body: Bytes,
) -> IntakeResponse {
    service
        .handle(IntakeRequest::from_http(&headers, body))
        .await
}

/// `POST /invoke` — gateway event in, gateway response object out.
///
/// The HTTP status is always 200; the handler's own status travels in
/// `statusCode`.
pub async fn invoke(
    State(service): State<IntakeService>,
    Json(event): Json<Value>,
) -> Json<IntakeResponse> {
    Json(service.handle(IntakeRequest::from_event(event)).await)
}

/// `GET /books/{id}` — read back a stored record.
pub async fn get_book(
    State(service): State<IntakeService>,
    Path(id): Path<String>,
) -> IntakeResponse {
    service.get_book(&id).await
}
