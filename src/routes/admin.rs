use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{
    handlers::{admin, auth},
    middleware::auth::auth_middleware,
    state::AppState,
};

pub fn admin_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        // GET /api/admin/ngo?status=Pending
        .route("/:role", get(admin::list_entities))
        .route("/:role/:id/approve", put(admin::approve_entity))
        .route("/:role/:id/reject", put(admin::reject_entity))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/login", post(auth::login_admin))
        .merge(protected)
}
