pub mod admin;
pub mod ngo;
pub mod pickup;
pub mod resort;

use axum::{http::Method, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::health;
use crate::state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_check))
        .route("/api/health", get(health::api_health_check))
        .nest("/api/ngo", ngo::ngo_routes(app_state.clone()))
        .nest("/api/resort", resort::resort_routes(app_state.clone()))
        .nest("/api/pickup", pickup::pickup_routes(app_state.clone()))
        .nest("/api/admin", admin::admin_routes(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::build_router;
    use crate::models::entity::Role;
    use crate::store::Store;
    use crate::test_support::TestHarness;

    struct TestApp {
        harness: TestHarness,
        router: Router,
    }

    impl TestApp {
        fn new() -> Self {
            let harness = TestHarness::new();
            let router = build_router(harness.state.clone());
            Self { harness, router }
        }

        async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json");
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }
            let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
            let response = self
                .router
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();

            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.call("POST", uri, None, Some(body)).await
        }

        /// Send and verify both OTPs over HTTP.
        async fn verify_contacts(&self, actor: &str, email: &str, phone: &str) {
            let (status, _) = self.post(&format!("/api/{actor}/send-otp"), json!({ "email": email })).await;
            assert_eq!(status, StatusCode::OK);
            let code = self.harness.notifier.last_code(email).unwrap();
            let (status, _) = self
                .post(&format!("/api/{actor}/verify-otp"), json!({ "email": email, "otp": code }))
                .await;
            assert_eq!(status, StatusCode::OK);

            let (status, _) = self.post(&format!("/api/{actor}/send-phone-otp"), json!({ "phone_no": phone })).await;
            assert_eq!(status, StatusCode::OK);
            let code = self.harness.notifier.last_code(phone).unwrap();
            let (status, _) = self
                .post(&format!("/api/{actor}/verify-phone-otp"), json!({ "phone_no": phone, "otp": code }))
                .await;
            assert_eq!(status, StatusCode::OK);
        }

        async fn admin_token(&self) -> String {
            self.harness
                .state
                .accounts
                .ensure_admin("root@surplussmile.test", "admin-pass-1")
                .await
                .unwrap();
            let (status, body) = self
                .post("/api/admin/login", json!({ "email": "root@surplussmile.test", "password": "admin-pass-1" }))
                .await;
            assert_eq!(status, StatusCode::OK);
            body["token"].as_str().unwrap().to_string()
        }

        async fn login(&self, actor: &str, email: &str, password: &str) -> String {
            let (status, body) = self
                .post(&format!("/api/{actor}/login"), json!({ "email": email, "password": password }))
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            body["token"].as_str().unwrap().to_string()
        }
    }

    fn ngo_registration() -> Value {
        json!({
            "name": "Helping Hands",
            "email": "contact@helpinghands.org",
            "location": "Goa",
            "phone_no": "+15550100",
            "isCertified": true,
            "address": "12 Market St",
        })
    }

    #[tokio::test]
    async fn ngo_registration_approval_and_login() {
        let app = TestApp::new();
        app.verify_contacts("ngo", "contact@helpinghands.org", "+15550100").await;

        let (status, body) = app.post("/api/ngo/register", ngo_registration()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "NGO registered, awaiting admin approval");
        assert!(body.get("token").is_none());

        let (status, body) = app.post("/api/ngo/register", ngo_registration()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "NGO already registered");

        // Not yet approved
        let (status, _) = app
            .post("/api/ngo/login", json!({ "email": "contact@helpinghands.org", "password": "x" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Approve out-of-band through the admin API
        let admin = app.admin_token().await;
        let (status, pending) = app.call("GET", "/api/admin/ngo?status=Pending", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let id = pending[0]["_id"].as_str().unwrap().to_string();
        let (status, _) = app
            .call(
                "PUT",
                &format!("/api/admin/ngo/{id}/approve"),
                Some(&admin),
                Some(json!({ "password": "correct-horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .post("/api/ngo/login", json!({ "email": "contact@helpinghands.org", "password": "correct-horse" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert!(body["token"].as_str().is_some());
        assert_eq!(body["ngo"]["name"], "Helping Hands");
        assert_eq!(body["ngo"]["isCertified"], true);

        let (status, wrong) = app
            .post("/api/ngo/login", json!({ "email": "contact@helpinghands.org", "password": "nope-nope" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, unknown) = app
            .post("/api/ngo/login", json!({ "email": "ghost@nowhere.org", "password": "nope-nope" }))
            .await;
        assert_eq!(wrong["message"], unknown["message"]);
    }

    #[tokio::test]
    async fn registration_without_phone_verification_is_rejected() {
        let app = TestApp::new();
        let (_, _) = app.post("/api/ngo/send-otp", json!({ "email": "contact@helpinghands.org" })).await;
        let code = app.harness.notifier.last_code("contact@helpinghands.org").unwrap();
        app.post("/api/ngo/verify-otp", json!({ "email": "contact@helpinghands.org", "otp": code }))
            .await;

        let (status, body) = app.post("/api/ngo/register", ngo_registration()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Phone number not verified");
    }

    #[tokio::test]
    async fn phone_otp_wrong_then_right() {
        let app = TestApp::new();

        let (status, body) = app
            .post("/api/ngo/verify-phone-otp", json!({ "phone_no": "+15550199", "otp": "123456" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Session not found. Please request a new OTP.");

        let (status, body) = app.post("/api/ngo/send-phone-otp", json!({ "phone_no": "+15550199" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OTP sent successfully");

        let code = app.harness.notifier.last_code("+15550199").unwrap();
        let wrong = if code == "999999" { "000000" } else { "999999" };
        let (status, body) = app
            .post("/api/ngo/verify-phone-otp", json!({ "phone_no": "+15550199", "otp": wrong }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Incorrect or expired OTP");

        let (status, body) = app
            .post("/api/ngo/verify-phone-otp", json!({ "phone_no": "+15550199", "otp": code }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Phone number verified successfully");

        let record = app
            .harness
            .store
            .find_otp("+15550199", crate::models::otp::OtpChannel::Phone)
            .await
            .unwrap()
            .unwrap();
        assert!(record.verified);
    }

    #[tokio::test]
    async fn failed_otp_delivery_is_a_server_error() {
        let app = TestApp::new();
        app.harness.notifier.fail_deliveries(true);
        let (status, body) = app.post("/api/ngo/send-phone-otp", json!({ "phone_no": "+15550199" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn protected_routes_require_bearer_token() {
        let app = TestApp::new();
        let (status, _) = app.call("GET", "/api/ngo/donations/pending", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .call("GET", "/api/ngo/donations/accepted", Some("not-a-token"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .call("PUT", "/api/pickup/confirm-by-ngo/64b7f0000000000000000000", None, None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn donation_pickup_handshake_over_http() {
        let app = TestApp::new();
        let h = &app.harness;
        h.register_approved(Role::Resort, "chef@palm.example", "+15550200", "resort-pass").await;
        h.register_approved(Role::Ngo, "ops@meals.org", "+15550300", "ngo-pass-1").await;
        let resort = app.login("resort", "chef@palm.example", "resort-pass").await;
        let ngo = app.login("ngo", "ops@meals.org", "ngo-pass-1").await;

        let (status, donation) = app
            .call(
                "POST",
                "/api/resort/donations",
                Some(&resort),
                Some(json!({
                    "foodName": "Veg biryani",
                    "quantity": "30 plates",
                    "type": "veg",
                    "foodMadeDate": "2026-10-17T10:00:00Z",
                    "pickupAddress": "Service entrance",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(donation["status"], "Pending");
        let id = donation["_id"].as_str().unwrap().to_string();

        // NGO tokens cannot create donations
        let (status, _) = app.call("POST", "/api/resort/donations", Some(&ngo), Some(json!({}))).await;
        assert_ne!(status, StatusCode::CREATED);

        // Not accepted yet
        let (status, _) = app
            .call("PUT", &format!("/api/pickup/confirm-by-ngo/{id}"), Some(&ngo), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, pending) = app.call("GET", "/api/ngo/donations/pending", Some(&ngo), None).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let (status, _) = app
            .call("PUT", &format!("/api/ngo/donations/{id}/accept"), Some(&ngo), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .call("PUT", &format!("/api/pickup/mark-picked/{id}"), Some(&ngo), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT, "{body}");

        let (status, body) = app
            .call("PUT", &format!("/api/pickup/confirm-by-ngo/{id}"), Some(&ngo), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transitioned"], false);
        assert_eq!(body["donation"]["pickupConfirmedByNGO"], true);

        let (status, body) = app
            .call("PUT", &format!("/api/pickup/confirm-by-resort/{id}"), Some(&resort), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transitioned"], true);
        assert_eq!(body["donation"]["pickupStatus"], "Picked");

        let (status, body) = app
            .call("PUT", &format!("/api/pickup/mark-picked/{id}"), Some(&resort), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transitioned"], false);

        let (_, accepted) = app.call("GET", "/api/ngo/donations/accepted", Some(&ngo), None).await;
        assert_eq!(accepted[0]["pickupStatus"], "Picked");
    }

    #[tokio::test]
    async fn admin_routes_reject_other_roles() {
        let app = TestApp::new();
        app.harness
            .register_approved(Role::Ngo, "ops@meals.org", "+15550300", "ngo-pass-1")
            .await;
        let ngo = app.login("ngo", "ops@meals.org", "ngo-pass-1").await;

        let (status, _) = app.call("GET", "/api/admin/ngo", Some(&ngo), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn health_reports_store() {
        let app = TestApp::new();
        let (status, body) = app.call("GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "connected");
    }
}
