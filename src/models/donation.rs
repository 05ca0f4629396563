use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DonationStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupStatus {
    Waiting,
    Picked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub resort_id: ObjectId,
    pub resort_name: String,
    pub resort_email: String,
    pub food_name: String,
    pub quantity: String,
    pub food_type: String,
    pub food_made_date: DateTime,
    pub pickup_address: String,
    pub status: DonationStatus,
    pub ngo_id: Option<ObjectId>,
    pub pickup_confirmed_by_resort: bool,
    pub pickup_confirmed_by_ngo: bool,
    pub pickup_status: PickupStatus,
    pub accepted_date: Option<DateTime>,
    pub pickup_date: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// The side of the handshake a confirmation comes from, with its account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupParty {
    Resort(ObjectId),
    Ngo(ObjectId),
}

impl PickupParty {
    /// Document field holding this side's confirmation flag.
    pub fn flag_field(&self) -> &'static str {
        match self {
            PickupParty::Resort(_) => "pickup_confirmed_by_resort",
            PickupParty::Ngo(_) => "pickup_confirmed_by_ngo",
        }
    }

    pub fn other_flag_field(&self) -> &'static str {
        match self {
            PickupParty::Resort(_) => "pickup_confirmed_by_ngo",
            PickupParty::Ngo(_) => "pickup_confirmed_by_resort",
        }
    }

    /// Document field binding this side to the donation.
    pub fn owner_field(&self) -> &'static str {
        match self {
            PickupParty::Resort(_) => "resort_id",
            PickupParty::Ngo(_) => "ngo_id",
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            PickupParty::Resort(id) | PickupParty::Ngo(id) => *id,
        }
    }
}

/// Result of a handshake step. `transitioned` is true for exactly one caller per donation.
#[derive(Debug, Clone)]
pub struct PickupOutcome {
    pub donation: Donation,
    pub transitioned: bool,
}

impl Donation {
    pub fn new(resort_id: ObjectId, resort_name: &str, resort_email: &str, payload: CreateDonation) -> Self {
        let now = DateTime::now();
        Self {
            _id: None,
            resort_id,
            resort_name: resort_name.to_string(),
            resort_email: resort_email.to_string(),
            food_name: payload.food_name,
            quantity: payload.quantity,
            food_type: payload.food_type,
            food_made_date: DateTime::from_chrono(payload.food_made_date),
            pickup_address: payload.pickup_address,
            status: DonationStatus::Pending,
            ngo_id: None,
            pickup_confirmed_by_resort: false,
            pickup_confirmed_by_ngo: false,
            pickup_status: PickupStatus::Waiting,
            accepted_date: None,
            pickup_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_bound_to(&self, party: &PickupParty) -> bool {
        match party {
            PickupParty::Resort(id) => self.resort_id == *id,
            PickupParty::Ngo(id) => self.ngo_id == Some(*id),
        }
    }

    pub fn both_confirmed(&self) -> bool {
        self.pickup_confirmed_by_resort && self.pickup_confirmed_by_ngo
    }

    pub fn accept(&mut self, ngo_id: ObjectId, now: DateTime) -> Result<()> {
        self.ensure_pending()?;
        self.status = DonationStatus::Accepted;
        self.ngo_id = Some(ngo_id);
        self.accepted_date = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, now: DateTime) -> Result<()> {
        self.ensure_pending()?;
        self.status = DonationStatus::Rejected;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.status != DonationStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "Donation is already {:?}",
                self.status
            )));
        }
        Ok(())
    }

    fn ensure_pickup_possible(&self, party: &PickupParty) -> Result<()> {
        if self.status != DonationStatus::Accepted {
            return Err(AppError::invalid_state("Donation has not been accepted"));
        }
        if !self.is_bound_to(party) {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    /// Sets `party`'s flag. The caller that completes the pair performs the
    /// terminal transition and gets `true` back.
    pub fn confirm_pickup(&mut self, party: &PickupParty, now: DateTime) -> Result<bool> {
        self.ensure_pickup_possible(party)?;
        if self.pickup_status == PickupStatus::Picked {
            return Err(AppError::invalid_state("Donation has already been picked up"));
        }

        match party {
            PickupParty::Resort(_) => self.pickup_confirmed_by_resort = true,
            PickupParty::Ngo(_) => self.pickup_confirmed_by_ngo = true,
        }
        self.updated_at = now;

        if self.both_confirmed() {
            self.pickup_status = PickupStatus::Picked;
            self.pickup_date = Some(now);
            return Ok(true);
        }
        Ok(false)
    }

    /// Terminal transition requested explicitly. No-op once Picked.
    pub fn mark_picked(&mut self, party: &PickupParty, now: DateTime) -> Result<bool> {
        self.ensure_pickup_possible(party)?;
        if self.pickup_status == PickupStatus::Picked {
            return Ok(false);
        }
        if !self.both_confirmed() {
            return Err(AppError::invalid_state(
                "Pickup must be confirmed by both the resort and the NGO",
            ));
        }
        self.pickup_status = PickupStatus::Picked;
        self.pickup_date = Some(now);
        self.updated_at = now;
        Ok(true)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonation {
    #[validate(length(min = 1, message = "Food name is required"))]
    pub food_name: String,
    #[validate(length(min = 1, message = "Quantity is required"))]
    pub quantity: String,
    #[serde(rename = "type")]
    pub food_type: String,
    pub food_made_date: ChronoDateTime<Utc>,
    #[validate(length(min = 1, message = "Pickup address is required"))]
    pub pickup_address: String,
}

/// Filters for listing donations. `None` means "any".
#[derive(Debug, Default, Clone)]
pub struct DonationFilter {
    pub status: Option<DonationStatus>,
    pub resort_id: Option<ObjectId>,
    pub ngo_id: Option<ObjectId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub resort_id: String,
    pub resort_name: String,
    pub email: String,
    pub food_name: String,
    pub quantity: String,
    #[serde(rename = "type")]
    pub food_type: String,
    pub food_made_date: ChronoDateTime<Utc>,
    pub pickup_address: String,
    pub status: DonationStatus,
    pub ngo_id: Option<String>,
    #[serde(rename = "pickupConfirmedByResort")]
    pub pickup_confirmed_by_resort: bool,
    #[serde(rename = "pickupConfirmedByNGO")]
    pub pickup_confirmed_by_ngo: bool,
    pub pickup_status: PickupStatus,
    pub accepted_date: Option<ChronoDateTime<Utc>>,
    pub pickup_date: Option<ChronoDateTime<Utc>>,
    pub created_at: ChronoDateTime<Utc>,
}

impl From<Donation> for DonationResponse {
    fn from(d: Donation) -> Self {
        DonationResponse {
            id: d._id.map(|id| id.to_hex()).unwrap_or_default(),
            resort_id: d.resort_id.to_hex(),
            resort_name: d.resort_name,
            email: d.resort_email,
            food_name: d.food_name,
            quantity: d.quantity,
            food_type: d.food_type,
            food_made_date: d.food_made_date.to_chrono(),
            pickup_address: d.pickup_address,
            status: d.status,
            ngo_id: d.ngo_id.map(|id| id.to_hex()),
            pickup_confirmed_by_resort: d.pickup_confirmed_by_resort,
            pickup_confirmed_by_ngo: d.pickup_confirmed_by_ngo,
            pickup_status: d.pickup_status,
            accepted_date: d.accepted_date.map(|t| t.to_chrono()),
            pickup_date: d.pickup_date.map(|t| t.to_chrono()),
            created_at: d.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PickupResponse {
    pub message: String,
    pub transitioned: bool,
    pub donation: DonationResponse,
}
