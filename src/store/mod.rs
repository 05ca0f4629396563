//! Record store seam. Everything stateful goes through here; the store is the
//! only synchronization point between concurrent requests.

pub mod memory;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::errors::Result;
use crate::models::donation::{Donation, DonationFilter, PickupOutcome, PickupParty};
use crate::models::entity::{ApprovalStatus, Entity, Role};
use crate::models::otp::{OtpChannel, OtpRecord};

pub use memory::MemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap liveness check for health endpoints
    async fn ping(&self) -> Result<()>;

    // ----- Entities -----

    async fn find_entity_by_email(&self, role: Role, email: &str) -> Result<Option<Entity>>;

    async fn find_entity(&self, role: Role, id: ObjectId) -> Result<Option<Entity>>;

    /// Persist a new entity. Fails with `Conflict` if the email is taken for that role.
    async fn insert_entity(&self, entity: Entity) -> Result<Entity>;

    async fn list_entities(&self, role: Role, status: Option<ApprovalStatus>) -> Result<Vec<Entity>>;

    /// Move a Pending entity to Approved/Rejected, optionally storing credentials.
    async fn decide_approval(
        &self,
        role: Role,
        id: ObjectId,
        status: ApprovalStatus,
        password_hash: Option<String>,
    ) -> Result<Entity>;

    // ----- OTP ledger -----

    /// Overwrite the record for (contact, channel).
    async fn replace_otp(&self, record: OtpRecord) -> Result<()>;

    async fn find_otp(&self, contact: &str, channel: OtpChannel) -> Result<Option<OtpRecord>>;

    async fn record_otp_failure(&self, contact: &str, channel: OtpChannel) -> Result<()>;

    /// Mark the record verified, but only while it still holds `code`, is
    /// unexpired and is under the attempt cap. Never creates a record.
    async fn confirm_otp(
        &self,
        contact: &str,
        channel: OtpChannel,
        code: &str,
        now: DateTime,
        max_attempts: i32,
    ) -> Result<bool>;

    /// Remove and return the record if it was verified after `since`. At most
    /// one caller gets a given verification.
    async fn claim_verified_otp(&self, contact: &str, channel: OtpChannel, since: DateTime) -> Result<Option<OtpRecord>>;

    /// Put a claimed record back unless a newer one was issued meanwhile.
    async fn restore_otp(&self, record: OtpRecord) -> Result<()>;

    // ----- Donations -----

    async fn insert_donation(&self, donation: Donation) -> Result<Donation>;

    async fn find_donation(&self, id: ObjectId) -> Result<Option<Donation>>;

    async fn list_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>>;

    async fn accept_donation(&self, id: ObjectId, ngo_id: ObjectId, now: DateTime) -> Result<Donation>;

    async fn reject_donation(&self, id: ObjectId, now: DateTime) -> Result<Donation>;

    /// Set `party`'s confirmation flag and, if the other flag is already set,
    /// move to Picked, all as one atomic step on the record.
    async fn confirm_pickup(&self, id: ObjectId, party: PickupParty, now: DateTime) -> Result<PickupOutcome>;

    /// Conditional Waiting→Picked once both flags are set.
    async fn mark_picked(&self, id: ObjectId, party: PickupParty, now: DateTime) -> Result<PickupOutcome>;
}
