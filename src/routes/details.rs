//! User details endpoint

use axum::{middleware, routing::get, Extension, Json, Router};

use crate::auth::require_user;
use crate::identity::UserDetails;
use crate::state::AppState;

/// Create the details router
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/details", get(get_details))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

/// Details of the authenticated caller, as verified by the identity provider
async fn get_details(Extension(user): Extension<UserDetails>) -> Json<UserDetails> {
    Json(user)
}
