use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::dtos::responses::MessageResponse;
use crate::errors::Result;
use crate::models::entity::{EntityProfile, LoginRequest, RegisterEntity, Role};
use crate::state::AppState;

async fn register(
    state: AppState,
    role: Role,
    payload: RegisterEntity,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    state.accounts.register(role, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok(format!(
            "{} registered, awaiting admin approval",
            role.label()
        ))),
    ))
}

async fn login(state: AppState, role: Role, payload: LoginRequest) -> Result<Json<Value>> {
    let (token, entity) = state.accounts.login(role, payload).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        role.as_str(): EntityProfile::from(entity),
    })))
}

pub async fn register_ngo(
    State(state): State<AppState>,
    Json(payload): Json<RegisterEntity>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    register(state, Role::Ngo, payload).await
}

pub async fn register_resort(
    State(state): State<AppState>,
    Json(payload): Json<RegisterEntity>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    register(state, Role::Resort, payload).await
}

pub async fn login_ngo(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>> {
    login(state, Role::Ngo, payload).await
}

pub async fn login_resort(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>> {
    login(state, Role::Resort, payload).await
}

pub async fn login_admin(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>> {
    login(state, Role::Admin, payload).await
}
