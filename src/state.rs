//! Shared router state.

use crate::services::intake_service::IntakeService;
use axum::extract::FromRef;
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

/// Process-wide handles, built once in `main` and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub intake: IntakeService,

    /// Pool behind the table store, probed by `/readyz`.
    pub db: Arc<SqlitePool>,

    /// Root of the disk object store, probed by `/readyz`.
    pub storage_dir: PathBuf,
}

impl FromRef<AppState> for IntakeService {
    fn from_ref(state: &AppState) -> Self {
        state.intake.clone()
    }
}
