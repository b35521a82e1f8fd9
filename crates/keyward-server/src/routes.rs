//! Route table.

use crate::handlers::{self, groups, roles, users};
use crate::middleware::auth::{require_admin, require_authenticated};
use crate::state::AppState;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the API router.
///
/// Registration, login and the health check are open; `/whoami` needs any
/// authenticated principal; everything else needs `admin`.
pub fn create_router(state: AppState) -> Router {
    let admin = middleware::from_fn_with_state(state.clone(), require_admin);
    let authenticated = middleware::from_fn_with_state(state.clone(), require_authenticated);

    let directory = Router::new()
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{id}/keys/rotate", post(users::rotate_key))
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/{id}",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route(
            "/groups/{id}",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        .route_layer(admin.clone());

    Router::new()
        .route("/healthz", get(handlers::healthz))
        // Method-level layer: only the listing is guarded.
        .route(
            "/users",
            get(users::list_users)
                .route_layer(admin)
                .post(users::register),
        )
        .route("/users/login", post(users::login))
        .route("/whoami", get(users::whoami).route_layer(authenticated))
        .merge(directory)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
