use std::sync::Arc;

use mongodb::bson::{oid::ObjectId, DateTime};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::donation::{
    CreateDonation, Donation, DonationFilter, DonationStatus, PickupOutcome, PickupParty,
};
use crate::models::entity::{ApprovalStatus, Role};
use crate::store::Store;

#[derive(Clone)]
pub struct DonationService {
    store: Arc<dyn Store>,
}

impl DonationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, resort_id: ObjectId, payload: CreateDonation) -> Result<Donation> {
        payload.validate()?;
        let resort = self
            .store
            .find_entity(Role::Resort, resort_id)
            .await?
            .filter(|r| r.approval_status == ApprovalStatus::Approved)
            .ok_or(AppError::Unauthorized)?;

        let donation = Donation::new(resort_id, &resort.name, &resort.email, payload);
        let donation = self.store.insert_donation(donation).await?;

        tracing::info!(resort = %resort.email, food = %donation.food_name, "🍱 Donation listed");
        Ok(donation)
    }

    pub async fn pending(&self) -> Result<Vec<Donation>> {
        self.store
            .list_donations(&DonationFilter {
                status: Some(DonationStatus::Pending),
                ..Default::default()
            })
            .await
    }

    pub async fn accepted_by(&self, ngo_id: ObjectId) -> Result<Vec<Donation>> {
        self.store
            .list_donations(&DonationFilter {
                status: Some(DonationStatus::Accepted),
                ngo_id: Some(ngo_id),
                ..Default::default()
            })
            .await
    }

    pub async fn listed_by(&self, resort_id: ObjectId) -> Result<Vec<Donation>> {
        self.store
            .list_donations(&DonationFilter {
                resort_id: Some(resort_id),
                ..Default::default()
            })
            .await
    }

    pub async fn accept(&self, id: ObjectId, ngo_id: ObjectId) -> Result<Donation> {
        let donation = self.store.accept_donation(id, ngo_id, DateTime::now()).await?;
        tracing::info!(donation = %id, ngo = %ngo_id, "Donation accepted");
        Ok(donation)
    }

    pub async fn reject(&self, id: ObjectId, ngo_id: ObjectId) -> Result<Donation> {
        let donation = self.store.reject_donation(id, DateTime::now()).await?;
        tracing::info!(donation = %id, ngo = %ngo_id, "Donation rejected");
        Ok(donation)
    }

    /// One side of the pickup handshake. The store decides atomically whether
    /// this call completes the pair.
    pub async fn confirm_pickup(&self, id: ObjectId, party: PickupParty) -> Result<PickupOutcome> {
        let outcome = self.store.confirm_pickup(id, party, DateTime::now()).await?;
        if outcome.transitioned {
            tracing::info!(donation = %id, "🚚 Both parties confirmed, donation picked");
        } else {
            tracing::info!(donation = %id, side = party.flag_field(), "Pickup confirmation recorded");
        }
        Ok(outcome)
    }

    pub async fn mark_picked(&self, id: ObjectId, party: PickupParty) -> Result<PickupOutcome> {
        let outcome = self.store.mark_picked(id, party, DateTime::now()).await?;
        if outcome.transitioned {
            tracing::info!(donation = %id, "🚚 Donation marked picked");
        }
        Ok(outcome)
    }
}
