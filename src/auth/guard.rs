//! Authorization guard middleware
//!
//! Resolves the caller's `Authorization` header to [`UserDetails`] through
//! the identity provider and stores them in the request extensions. Handlers
//! behind the guard read them with `Extension<UserDetails>`.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::identity::{AccessToken, AuthError, UserDetails};
use crate::state::AppState;

/// Authenticate the caller from request headers
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserDetails, AuthError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AuthError::MissingToken("no Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AuthError::MissingToken("Authorization header is not visible ASCII".to_string()))?;

    let token = AccessToken::parse(header)?;
    state.identity().user_details(&token).await
}

/// Require a verified identity
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, request.headers()).await?;
    tracing::debug!(user_id = %user.id, "Authenticated request");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Require a verified identity holding the configured role, if any
pub async fn require_annotator(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, request.headers()).await?;

    if let Some(role) = state.config().annotation.required_role.as_deref() {
        if !user.has_role(role) {
            tracing::info!(user_id = %user.id, role, "Rejected request lacking required role");
            return Err(AuthError::Forbidden(role.to_string()).into());
        }
    }
    tracing::debug!(user_id = %user.id, "Authenticated annotator");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
