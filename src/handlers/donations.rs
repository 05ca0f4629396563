use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use mongodb::bson::oid::ObjectId;

use crate::errors::Result;
use crate::models::donation::{CreateDonation, DonationResponse};
use crate::models::entity::{Claims, Role};
use crate::state::AppState;

fn to_responses(donations: Vec<crate::models::donation::Donation>) -> Json<Vec<DonationResponse>> {
    Json(donations.into_iter().map(DonationResponse::from).collect())
}

// Resort side

pub async fn create_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateDonation>,
) -> Result<(StatusCode, Json<DonationResponse>)> {
    let resort_id = claims.require(Role::Resort)?;
    let donation = state.donations.create(resort_id, payload).await?;
    Ok((StatusCode::CREATED, Json(DonationResponse::from(donation))))
}

pub async fn resort_donations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<DonationResponse>>> {
    let resort_id = claims.require(Role::Resort)?;
    Ok(to_responses(state.donations.listed_by(resort_id).await?))
}

// NGO side

pub async fn pending_donations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<DonationResponse>>> {
    claims.require(Role::Ngo)?;
    Ok(to_responses(state.donations.pending().await?))
}

pub async fn accepted_donations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<DonationResponse>>> {
    let ngo_id = claims.require(Role::Ngo)?;
    Ok(to_responses(state.donations.accepted_by(ngo_id).await?))
}

pub async fn accept_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(donation_id): Path<String>,
) -> Result<Json<DonationResponse>> {
    let ngo_id = claims.require(Role::Ngo)?;
    let id = ObjectId::parse_str(&donation_id)?;
    let donation = state.donations.accept(id, ngo_id).await?;
    Ok(Json(DonationResponse::from(donation)))
}

pub async fn reject_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(donation_id): Path<String>,
) -> Result<Json<DonationResponse>> {
    let ngo_id = claims.require(Role::Ngo)?;
    let id = ObjectId::parse_str(&donation_id)?;
    let donation = state.donations.reject(id, ngo_id).await?;
    Ok(Json(DonationResponse::from(donation)))
}
