use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{AppendHeaders, IntoResponse},
};
use uuid::Uuid;

use quill_auth::cookie::CookieConfig;
use quill_auth::password;
use quill_auth::token::TokenSigner;
use quill_db::Database;
use quill_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenSigner,
    pub cookies: CookieConfig,
    pub session_ttl_secs: i64,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Invalid("username must be 3-32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Invalid("password must be at least 8 characters"));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Invalid("invalid email address"));
    }

    let password_hash = password::hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    // Run blocking DB work off the async runtime
    let db = state.clone();
    let username = req.username.clone();
    let uid = user_id.to_string();
    tokio::task::spawn_blocking(move || {
        db.db
            .create_user(&uid, &req.email, &username, &password_hash, &quill_db::timestamp_now())
    })
    .await
    .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            username: req.username,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let username = req.username.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_username(&username))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))??
        .ok_or(ApiError::Unauthenticated)?;

    if !password::verify_password(&req.password, &user.password) {
        return Err(ApiError::Unauthenticated);
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id {:?}: {e}", user.id))?;

    let token = state
        .tokens
        .issue(user_id, &user.username, state.session_ttl_secs)?;

    Ok((
        AppendHeaders([(header::SET_COOKIE, state.cookies.build_set_cookie(&token))]),
        Json(LoginResponse {
            user_id,
            username: user.username,
        }),
    ))
}

/// Clears the session cookie. The token itself stays valid until it expires;
/// there is no server-side denylist.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        AppendHeaders([(header::SET_COOKIE, state.cookies.build_delete_cookie())]),
    )
}
