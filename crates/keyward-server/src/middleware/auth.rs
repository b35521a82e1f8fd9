use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use keyward_auth::Decision;

/// Role required by administrative routes.
pub const ADMIN_ROLE: &str = "admin";

/// Axum middleware admitting only principals holding `admin`.
///
/// On success the [`keyward_auth::Authorized`] caller is stored in the
/// request extensions.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(&state, req, next, Some(ADMIN_ROLE)).await
}

/// Axum middleware admitting any authenticated principal.
pub async fn require_authenticated(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    guard(&state, req, next, None).await
}

async fn guard(state: &AppState, mut req: Request, next: Next, role: Option<&str>) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    match state.gate.authorize(header.as_deref(), role).await {
        Decision::Allow(authorized) => {
            req.extensions_mut().insert(authorized);
            next.run(req).await
        }
        Decision::Deny(reason) if reason.is_forbidden() => ApiError::Forbidden.into_response(),
        Decision::Deny(_) => ApiError::Unauthorized.into_response(),
    }
}
