use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use quill_auth::cookie::extract_cookie;

use crate::auth::AppState;
use crate::error::ApiError;

/// Resolve the acting identity from the session cookie and stash the verified
/// claims in request extensions for downstream handlers.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_cookie(req.headers(), &state.cookies.name)
        .ok_or(ApiError::Unauthenticated)?;

    let claims = state.tokens.verify(&token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
