use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{auth, auth_otp, donations},
    middleware::auth::auth_middleware,
    state::AppState,
};

pub fn resort_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route(
            "/donations",
            get(donations::resort_donations).post(donations::create_donation),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/register", post(auth::register_resort))
        .route("/login", post(auth::login_resort))
        .route("/send-otp", post(auth_otp::send_email_otp))
        .route("/verify-otp", post(auth_otp::verify_email_otp))
        .route("/send-phone-otp", post(auth_otp::send_phone_otp))
        .route("/verify-phone-otp", post(auth_otp::verify_phone_otp))
        .merge(protected)
}
