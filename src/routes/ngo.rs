use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{
    handlers::{auth, auth_otp, donations},
    middleware::auth::auth_middleware,
    state::AppState,
};

pub fn ngo_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/donations/pending", get(donations::pending_donations))
        .route("/donations/accepted", get(donations::accepted_donations))
        .route("/donations/:id/accept", put(donations::accept_donation))
        .route("/donations/:id/reject", put(donations::reject_donation))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/register", post(auth::register_ngo))
        .route("/login", post(auth::login_ngo))

        // Email and phone verification before registering
        .route("/send-otp", post(auth_otp::send_email_otp))
        .route("/verify-otp", post(auth_otp::verify_email_otp))
        .route("/send-phone-otp", post(auth_otp::send_phone_otp))
        .route("/verify-phone-otp", post(auth_otp::verify_phone_otp))
        .merge(protected)
}
