use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use mongodb::bson::oid::ObjectId;

use crate::errors::{AppError, Result};
use crate::models::donation::{DonationResponse, PickupOutcome, PickupParty, PickupResponse};
use crate::models::entity::{Claims, Role};
use crate::state::AppState;

fn party_of(claims: &Claims) -> Result<PickupParty> {
    match claims.role {
        Role::Ngo => Ok(PickupParty::Ngo(claims.subject_id()?)),
        Role::Resort => Ok(PickupParty::Resort(claims.subject_id()?)),
        Role::Admin => Err(AppError::Forbidden),
    }
}

fn respond(outcome: PickupOutcome) -> Json<PickupResponse> {
    let message = if outcome.transitioned {
        "Pickup confirmed by both parties, donation marked as picked"
    } else if outcome.donation.both_confirmed() {
        "Donation already picked"
    } else {
        "Pickup confirmation recorded, waiting for the other party"
    };
    Json(PickupResponse {
        message: message.to_string(),
        transitioned: outcome.transitioned,
        donation: DonationResponse::from(outcome.donation),
    })
}

pub async fn confirm_by_ngo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(donation_id): Path<String>,
) -> Result<Json<PickupResponse>> {
    let ngo_id = claims.require(Role::Ngo)?;
    let id = ObjectId::parse_str(&donation_id)?;
    let outcome = state
        .donations
        .confirm_pickup(id, PickupParty::Ngo(ngo_id))
        .await?;
    Ok(respond(outcome))
}

pub async fn confirm_by_resort(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(donation_id): Path<String>,
) -> Result<Json<PickupResponse>> {
    let resort_id = claims.require(Role::Resort)?;
    let id = ObjectId::parse_str(&donation_id)?;
    let outcome = state
        .donations
        .confirm_pickup(id, PickupParty::Resort(resort_id))
        .await?;
    Ok(respond(outcome))
}

pub async fn mark_picked(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(donation_id): Path<String>,
) -> Result<Json<PickupResponse>> {
    let party = party_of(&claims)?;
    let id = ObjectId::parse_str(&donation_id)?;
    let outcome = state.donations.mark_picked(id, party).await?;
    Ok(respond(outcome))
}
