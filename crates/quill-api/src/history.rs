use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use quill_auth::token::Claims;
use quill_types::api::HistoryEntryResponse;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::posts::{parse_timestamp, parse_uuid};

/// Audit log, newest first. Entries whose post or actor no longer exists come
/// back with placeholder title/username rather than failing the listing.
pub async fn list_history(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_history())
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??;

    let entries: Vec<HistoryEntryResponse> = rows
        .into_iter()
        .map(|row| HistoryEntryResponse {
            id: parse_uuid(&row.id, "history id"),
            operation: row.operation,
            actor_id: parse_uuid(&row.actor_id, "actor id"),
            actor_username: row.actor_username,
            post_id: parse_uuid(&row.post_id, "post id"),
            post_title: row.post_title,
            timestamp: parse_timestamp(&row.timestamp, &row.id),
        })
        .collect();

    Ok(Json(entries))
}

/// Administrative reset of the audit log. Requires a valid session; any
/// authenticated user may clear, there is no finer-grained role model.
pub async fn clear_history(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.clear_history())
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??;

    Ok(StatusCode::NO_CONTENT)
}
