use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::entity::{ApproveRequest, Claims, EntityProfile, EntityQuery, Role};
use crate::state::AppState;

// Only donor and recipient accounts go through approval.
fn approvable(role: Role) -> Result<Role> {
    match role {
        Role::Ngo | Role::Resort => Ok(role),
        Role::Admin => Err(AppError::NotFound("Role")),
    }
}

pub async fn list_entities(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(role): Path<Role>,
    Query(query): Query<EntityQuery>,
) -> Result<Json<Vec<EntityProfile>>> {
    claims.require(Role::Admin)?;
    let entities = state.accounts.list(approvable(role)?, query.status).await?;
    Ok(Json(entities.into_iter().map(EntityProfile::from).collect()))
}

pub async fn approve_entity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((role, id)): Path<(Role, String)>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<Value>> {
    claims.require(Role::Admin)?;
    let role = approvable(role)?;
    let id = ObjectId::parse_str(&id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    req.validate()?;

    let entity = state.accounts.approve(role, id, req.password).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{} approved", role.label()),
        role.as_str(): EntityProfile::from(entity),
    })))
}

pub async fn reject_entity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((role, id)): Path<(Role, String)>,
) -> Result<Json<Value>> {
    claims.require(Role::Admin)?;
    let role = approvable(role)?;
    let id = ObjectId::parse_str(&id)?;

    let entity = state.accounts.reject(role, id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{} rejected", role.label()),
        role.as_str(): EntityProfile::from(entity),
    })))
}
