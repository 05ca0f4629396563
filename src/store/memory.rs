//! In-memory store. Each mutation runs its check-and-set under the owning
//! map's write lock, so a record is never observed half-updated.

use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};
use tokio::sync::RwLock;

use super::Store;
use crate::errors::{AppError, Result};
use crate::models::donation::{Donation, DonationFilter, PickupOutcome, PickupParty};
use crate::models::entity::{ApprovalStatus, Entity, Role};
use crate::models::otp::{OtpChannel, OtpRecord};

#[derive(Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<ObjectId, Entity>>,
    otps: RwLock<HashMap<(String, OtpChannel), OtpRecord>>,
    donations: RwLock<HashMap<ObjectId, Donation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update_donation<F>(&self, id: ObjectId, apply: F) -> Result<(Donation, bool)>
    where
        F: FnOnce(&mut Donation) -> Result<bool> + Send,
    {
        let mut donations = self.donations.write().await;
        let donation = donations.get_mut(&id).ok_or(AppError::NotFound("Donation"))?;
        // Work on a copy so a rejected step leaves the record untouched.
        let mut next = donation.clone();
        let changed = apply(&mut next)?;
        *donation = next.clone();
        Ok((next, changed))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_entity_by_email(&self, role: Role, email: &str) -> Result<Option<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities
            .values()
            .find(|e| e.role == role && e.email == email)
            .cloned())
    }

    async fn find_entity(&self, role: Role, id: ObjectId) -> Result<Option<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities.get(&id).filter(|e| e.role == role).cloned())
    }

    async fn insert_entity(&self, mut entity: Entity) -> Result<Entity> {
        let mut entities = self.entities.write().await;
        if entities
            .values()
            .any(|e| e.role == entity.role && e.email == entity.email)
        {
            return Err(AppError::Conflict(format!(
                "{} already registered",
                entity.role.label()
            )));
        }
        let id = ObjectId::new();
        entity._id = Some(id);
        entities.insert(id, entity.clone());
        Ok(entity)
    }

    async fn list_entities(&self, role: Role, status: Option<ApprovalStatus>) -> Result<Vec<Entity>> {
        let entities = self.entities.read().await;
        let mut found: Vec<Entity> = entities
            .values()
            .filter(|e| e.role == role && status.map_or(true, |s| e.approval_status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn decide_approval(
        &self,
        role: Role,
        id: ObjectId,
        status: ApprovalStatus,
        password_hash: Option<String>,
    ) -> Result<Entity> {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&id)
            .filter(|e| e.role == role)
            .ok_or(AppError::NotFound(role.label()))?;
        if entity.approval_status != ApprovalStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "{} is already {:?}",
                role.label(),
                entity.approval_status
            )));
        }
        entity.approval_status = status;
        if password_hash.is_some() {
            entity.password_hash = password_hash;
        }
        entity.updated_at = DateTime::now();
        Ok(entity.clone())
    }

    async fn replace_otp(&self, record: OtpRecord) -> Result<()> {
        let mut otps = self.otps.write().await;
        otps.insert((record.contact.clone(), record.channel), record);
        Ok(())
    }

    async fn find_otp(&self, contact: &str, channel: OtpChannel) -> Result<Option<OtpRecord>> {
        let otps = self.otps.read().await;
        Ok(otps.get(&(contact.to_string(), channel)).cloned())
    }

    async fn record_otp_failure(&self, contact: &str, channel: OtpChannel) -> Result<()> {
        let mut otps = self.otps.write().await;
        if let Some(record) = otps.get_mut(&(contact.to_string(), channel)) {
            record.attempts += 1;
        }
        Ok(())
    }

    async fn confirm_otp(
        &self,
        contact: &str,
        channel: OtpChannel,
        code: &str,
        now: DateTime,
        max_attempts: i32,
    ) -> Result<bool> {
        let mut otps = self.otps.write().await;
        match otps.get_mut(&(contact.to_string(), channel)) {
            Some(record) if record.accepts(code, now, max_attempts) => {
                record.verified = true;
                record.verified_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn claim_verified_otp(&self, contact: &str, channel: OtpChannel, since: DateTime) -> Result<Option<OtpRecord>> {
        let mut otps = self.otps.write().await;
        let key = (contact.to_string(), channel);
        if !otps.get(&key).map_or(false, |r| r.verified_since(since)) {
            return Ok(None);
        }
        Ok(otps.remove(&key))
    }

    async fn restore_otp(&self, record: OtpRecord) -> Result<()> {
        let mut otps = self.otps.write().await;
        otps.entry((record.contact.clone(), record.channel))
            .or_insert(record);
        Ok(())
    }

    async fn insert_donation(&self, mut donation: Donation) -> Result<Donation> {
        let id = ObjectId::new();
        donation._id = Some(id);
        self.donations.write().await.insert(id, donation.clone());
        Ok(donation)
    }

    async fn find_donation(&self, id: ObjectId) -> Result<Option<Donation>> {
        Ok(self.donations.read().await.get(&id).cloned())
    }

    async fn list_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>> {
        let donations = self.donations.read().await;
        let mut found: Vec<Donation> = donations
            .values()
            .filter(|d| filter.status.map_or(true, |s| d.status == s))
            .filter(|d| filter.resort_id.map_or(true, |id| d.resort_id == id))
            .filter(|d| filter.ngo_id.map_or(true, |id| d.ngo_id == Some(id)))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn accept_donation(&self, id: ObjectId, ngo_id: ObjectId, now: DateTime) -> Result<Donation> {
        let (donation, _) = self
            .update_donation(id, |d| d.accept(ngo_id, now).map(|_| true))
            .await?;
        Ok(donation)
    }

    async fn reject_donation(&self, id: ObjectId, now: DateTime) -> Result<Donation> {
        let (donation, _) = self
            .update_donation(id, |d| d.reject(now).map(|_| true))
            .await?;
        Ok(donation)
    }

    async fn confirm_pickup(&self, id: ObjectId, party: PickupParty, now: DateTime) -> Result<PickupOutcome> {
        let (donation, transitioned) = self
            .update_donation(id, |d| d.confirm_pickup(&party, now))
            .await?;
        Ok(PickupOutcome { donation, transitioned })
    }

    async fn mark_picked(&self, id: ObjectId, party: PickupParty, now: DateTime) -> Result<PickupOutcome> {
        let (donation, transitioned) = self
            .update_donation(id, |d| d.mark_picked(&party, now))
            .await?;
        Ok(PickupOutcome { donation, transitioned })
    }
}
