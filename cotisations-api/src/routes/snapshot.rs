/// Whole-store export and import
///
/// # Endpoints
///
/// - `GET /v1/snapshot` - Export every collection
/// - `POST /v1/snapshot` - Replace the collections present in the snapshot
///
/// Importing replaces each named collection wholesale, keys included.
/// Collections missing from the snapshot are left untouched and unknown
/// collection names are reported back as skipped.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use cotisations_shared::store::{ImportReport, Snapshot};
use tracing::info;

/// Export every collection
pub async fn export_snapshot(State(state): State<AppState>) -> ApiResult<Json<Snapshot>> {
    let snapshot = state.store.export_all().await?;
    info!(collections = snapshot.collections.len(), "Snapshot exported");
    Ok(Json(snapshot))
}

/// Import a snapshot
pub async fn import_snapshot(
    State(state): State<AppState>,
    Json(snapshot): Json<Snapshot>,
) -> ApiResult<Json<ImportReport>> {
    Ok(Json(state.store.import_all(&snapshot).await?))
}
