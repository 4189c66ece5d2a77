use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use quill_auth::token::Claims;
use quill_db::models::PostRow;
use quill_types::api::{CreatePostRequest, EditPostRequest, PostResponse};

use crate::auth::AppState;
use crate::authz;
use crate::error::ApiError;

pub async fn list_posts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_posts())
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??;

    let posts: Vec<PostResponse> = rows.into_iter().map(post_response).collect();
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let pid = id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_post(&pid))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??
        .ok_or(ApiError::NotFound)?;

    Ok(Json(post_response(row)))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Invalid("title must not be empty"));
    }
    if req.content.trim().is_empty() {
        return Err(ApiError::Invalid("content must not be empty"));
    }

    let post_id = Uuid::new_v4();
    let now = chrono::Utc::now();

    let db = state.clone();
    let pid = post_id.to_string();
    let aid = claims.sub.to_string();
    let title = req.title.clone();
    let content = req.content.clone();
    let stamp = quill_db::format_timestamp(now);
    tokio::task::spawn_blocking(move || {
        db.db
            .create_post(&pid, &title, &content, &aid, &Uuid::new_v4().to_string(), &stamp)
    })
    .await
    .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??;

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: post_id,
            title: req.title,
            content: req.content,
            author_id: claims.sub,
            author_username: claims.username,
            created_at: now,
        }),
    ))
}

pub async fn edit_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Invalid("title must not be empty"));
    }
    if req.content.trim().is_empty() {
        return Err(ApiError::Invalid("content must not be empty"));
    }

    let row = fetch_post(&state, id).await?.ok_or(ApiError::NotFound)?;

    // Denied before any store write or history append
    if !authz::can_mutate(&claims, &row) {
        return Err(ApiError::Forbidden);
    }

    let db = state.clone();
    let pid = id.to_string();
    let aid = claims.sub.to_string();
    let title = req.title.clone();
    let content = req.content.clone();
    tokio::task::spawn_blocking(move || {
        db.db.update_post(
            &pid,
            &title,
            &content,
            &aid,
            &Uuid::new_v4().to_string(),
            &quill_db::timestamp_now(),
        )
    })
    .await
    .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??;

    Ok(Json(PostResponse {
        id,
        title: req.title,
        content: req.content,
        author_id: claims.sub,
        author_username: row.author_username,
        created_at: parse_timestamp(&row.created_at, &row.id),
    }))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = fetch_post(&state, id).await?.ok_or(ApiError::NotFound)?;

    if !authz::can_mutate(&claims, &row) {
        return Err(ApiError::Forbidden);
    }

    let db = state.clone();
    let pid = id.to_string();
    let aid = claims.sub.to_string();
    tokio::task::spawn_blocking(move || {
        db.db
            .delete_post(&pid, &aid, &Uuid::new_v4().to_string(), &quill_db::timestamp_now())
    })
    .await
    .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_post(state: &AppState, id: Uuid) -> Result<Option<PostRow>, ApiError> {
    let db = state.clone();
    let pid = id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_post(&pid))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??;
    Ok(row)
}

fn post_response(row: PostRow) -> PostResponse {
    PostResponse {
        id: parse_uuid(&row.id, "post id"),
        title: row.title,
        content: row.content,
        author_id: parse_uuid(&row.author_id, "author id"),
        author_username: row.author_username,
        created_at: parse_timestamp(&row.created_at, &row.id),
    }
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(raw: &str, row_id: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite's datetime() emits "YYYY-MM-DD HH:MM:SS" without timezone.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on row '{}': {}", raw, row_id, e);
            chrono::DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use quill_auth::cookie::CookieConfig;
    use quill_auth::token::TokenSigner;
    use quill_db::Database;

    use crate::auth::AppStateInner;

    fn state_with_post(owner: Uuid, post_id: Uuid) -> AppState {
        let db = Database::open_in_memory().unwrap();
        db.create_user(
            &owner.to_string(),
            "alice@example.com",
            "alice",
            "digest",
            "2024-01-01T00:00:00.000000Z",
        )
        .unwrap();
        db.create_post(
            &post_id.to_string(),
            "Original title",
            "Original body",
            &owner.to_string(),
            &Uuid::new_v4().to_string(),
            "2024-01-01T00:00:01.000000Z",
        )
        .unwrap();
        // drop the creation entry so the log reflects only what happens next
        db.clear_history().unwrap();

        Arc::new(AppStateInner {
            db,
            tokens: TokenSigner::new(&b"test-secret"[..]),
            cookies: CookieConfig::default(),
            session_ttl_secs: 3600,
        })
    }

    fn claims_for(id: Uuid, username: &str) -> Claims {
        Claims {
            sub: id,
            username: username.to_string(),
            exp: i64::MAX,
        }
    }

    #[tokio::test]
    async fn non_owner_edit_is_denied_without_mutation_or_log() {
        let owner = Uuid::new_v4();
        let post_id = Uuid::new_v4();
        let state = state_with_post(owner, post_id);

        let result = edit_post(
            State(state.clone()),
            Path(post_id),
            Extension(claims_for(Uuid::new_v4(), "mallory")),
            Json(EditPostRequest {
                title: "hijacked".to_string(),
                content: "hijacked".to_string(),
            }),
        )
        .await;

        let Err(err) = result else {
            panic!("non-owner edit succeeded")
        };
        assert!(matches!(err, ApiError::Forbidden));

        let post = state.db.get_post(&post_id.to_string()).unwrap().unwrap();
        assert_eq!(post.title, "Original title");
        assert_eq!(post.content, "Original body");
        assert!(state.db.list_history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_owner_delete_is_denied_without_mutation_or_log() {
        let owner = Uuid::new_v4();
        let post_id = Uuid::new_v4();
        let state = state_with_post(owner, post_id);

        let result = delete_post(
            State(state.clone()),
            Path(post_id),
            Extension(claims_for(Uuid::new_v4(), "mallory")),
        )
        .await;

        let Err(err) = result else {
            panic!("non-owner delete succeeded")
        };
        assert!(matches!(err, ApiError::Forbidden));

        assert!(state.db.get_post(&post_id.to_string()).unwrap().is_some());
        assert!(state.db.list_history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_edit_succeeds_and_logs_one_entry() {
        let owner = Uuid::new_v4();
        let post_id = Uuid::new_v4();
        let state = state_with_post(owner, post_id);

        let result = edit_post(
            State(state.clone()),
            Path(post_id),
            Extension(claims_for(owner, "alice")),
            Json(EditPostRequest {
                title: "Updated".to_string(),
                content: "Updated body".to_string(),
            }),
        )
        .await;
        assert!(result.is_ok());

        let post = state.db.get_post(&post_id.to_string()).unwrap().unwrap();
        assert_eq!(post.title, "Updated");

        let history = state.db.list_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].operation, "edit");
        assert_eq!(history[0].actor_id, owner.to_string());
    }
}
