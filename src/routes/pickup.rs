use axum::{middleware, routing::put, Router};

use crate::{handlers::pickup, middleware::auth::auth_middleware, state::AppState};

pub fn pickup_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/confirm-by-ngo/:id", put(pickup::confirm_by_ngo))
        .route("/confirm-by-resort/:id", put(pickup::confirm_by_resort))
        .route("/mark-picked/:id", put(pickup::mark_picked))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
