/// Settings endpoints
///
/// Settings are JSON values stored under a string key in `parametres`.
/// The navigation shell keeps its preferences there too (`derniere_route`,
/// `sidebar_reduite`).
///
/// # Endpoints
///
/// - `GET /v1/settings/:key` - Read a value
/// - `PUT /v1/settings/:key` - Write a value, creating the setting if needed
/// - `DELETE /v1/settings/:key` - Remove a setting

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Setting value, in requests and responses
#[derive(Debug, Serialize, Deserialize)]
pub struct SettingBody {
    /// Setting key; ignored in requests
    #[serde(default, skip_deserializing)]
    pub cle: String,

    /// JSON value
    pub valeur: Value,
}

/// Read a setting
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SettingBody>> {
    let valeur: Value = state
        .store
        .get_setting(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Setting not found: {}", key)))?;

    Ok(Json(SettingBody { cle: key, valeur }))
}

/// Write a setting
///
/// ```text
/// PUT /v1/settings/sidebar_reduite
///
/// { "valeur": true }
/// ```
pub async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SettingBody>,
) -> ApiResult<Json<SettingBody>> {
    if key.trim().is_empty() {
        return Err(ApiError::invalid("cle", "Setting key must not be empty"));
    }

    state.store.set_setting(&key, &body.valeur).await?;
    info!(key = %key, "Setting saved");

    Ok(Json(SettingBody {
        cle: key,
        valeur: body.valeur,
    }))
}

/// Remove a setting
pub async fn delete_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    if state.store.delete_setting(&key).await? {
        info!(key = %key, "Setting deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Setting not found: {}", key)))
    }
}
