//! Defines routes for book intake.
//!
//! ## Structure
//! - **Intake endpoints**
//!   - `POST /books`     — create a book from a JSON or multipart body
//!   - `POST /invoke`    — same, wrapped in a gateway event envelope
//!   - `GET  /books/{id}` — read a stored book back
//!
//! - **Probes**
//!   - `GET /healthz`, `GET /readyz`

use crate::{
    handlers::{
        book_handlers::{create_book, get_book, invoke},
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the router, capping request bodies at `max_body_bytes`.
pub fn routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/books", post(create_book))
        .route("/books/{id}", get(get_book))
        .route("/invoke", post(invoke))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
