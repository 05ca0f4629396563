use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, DateTime, Document},
    options::ReturnDocument,
    Collection, Database,
};
use serde::Serialize;

use crate::errors::{AppError, Result};
use crate::models::donation::{
    Donation, DonationFilter, DonationStatus, PickupOutcome, PickupParty, PickupStatus,
};
use crate::models::entity::{ApprovalStatus, Entity, Role};
use crate::models::otp::{OtpChannel, OtpRecord};
use crate::store::Store;

// A record can change between a missed conditional update and the re-read
// used to explain the miss; retry that many times before giving up.
const CONDITIONAL_RETRIES: usize = 3;

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn entities(&self, role: Role) -> Collection<Entity> {
        self.db.collection(role.collection())
    }

    fn otps(&self) -> Collection<OtpRecord> {
        self.db.collection("otps")
    }

    fn donations(&self) -> Collection<Donation> {
        self.db.collection("donations")
    }

    async fn load_donation(&self, id: ObjectId) -> Result<Donation> {
        self.find_donation(id)
            .await?
            .ok_or(AppError::NotFound("Donation"))
    }
}

fn bson_of<T: Serialize>(value: &T) -> Result<Bson> {
    mongodb::bson::to_bson(value)
        .map_err(|e| AppError::internal(format!("BSON conversion failed: {}", e)))
}

/// Filter and update pipeline for one side of the pickup handshake.
///
/// The filter only matches an Accepted, still Waiting donation bound to
/// `party`. Field paths in `$set` resolve against the pre-update document, so
/// the other side's flag is read and ours written in one server-side step.
fn pickup_confirmation(id: ObjectId, party: &PickupParty, now: DateTime) -> Result<(Document, Vec<Document>)> {
    let picked = bson_of(&PickupStatus::Picked)?;

    let mut filter = doc! {
        "_id": id,
        "status": bson_of(&DonationStatus::Accepted)?,
        "pickup_status": bson_of(&PickupStatus::Waiting)?,
    };
    filter.insert(party.owner_field(), party.id());

    let other_set = doc! { "$eq": [format!("${}", party.other_flag_field()), true] };
    let mut set = doc! {
        "updated_at": now,
        "pickup_status": { "$cond": [other_set.clone(), picked, "$pickup_status"] },
        "pickup_date": { "$cond": [other_set, now, "$pickup_date"] },
    };
    set.insert(party.flag_field(), true);

    Ok((filter, vec![doc! { "$set": set }]))
}

#[async_trait]
impl Store for MongoStore {
    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find_entity_by_email(&self, role: Role, email: &str) -> Result<Option<Entity>> {
        Ok(self.entities(role).find_one(doc! { "email": email }).await?)
    }

    async fn find_entity(&self, role: Role, id: ObjectId) -> Result<Option<Entity>> {
        Ok(self.entities(role).find_one(doc! { "_id": id }).await?)
    }

    async fn insert_entity(&self, mut entity: Entity) -> Result<Entity> {
        let role = entity.role;
        match self.entities(role).insert_one(&entity).await {
            Ok(result) => {
                entity._id = result.inserted_id.as_object_id();
                Ok(entity)
            }
            Err(e) if AppError::is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "{} already registered",
                role.label()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_entities(&self, role: Role, status: Option<ApprovalStatus>) -> Result<Vec<Entity>> {
        let mut filter = doc! {};
        if let Some(status) = status {
            filter.insert("approval_status", bson_of(&status)?);
        }
        let cursor = self
            .entities(role)
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn decide_approval(
        &self,
        role: Role,
        id: ObjectId,
        status: ApprovalStatus,
        password_hash: Option<String>,
    ) -> Result<Entity> {
        let mut set = doc! {
            "approval_status": bson_of(&status)?,
            "updated_at": DateTime::now(),
        };
        if let Some(hash) = password_hash {
            set.insert("password_hash", hash);
        }

        let updated = self
            .entities(role)
            .find_one_and_update(
                doc! { "_id": id, "approval_status": bson_of(&ApprovalStatus::Pending)? },
                doc! { "$set": set },
            )
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(entity) => Ok(entity),
            None => match self.find_entity(role, id).await? {
                None => Err(AppError::NotFound(role.label())),
                Some(entity) => Err(AppError::invalid_state(format!(
                    "{} is already {:?}",
                    role.label(),
                    entity.approval_status
                ))),
            },
        }
    }

    async fn replace_otp(&self, record: OtpRecord) -> Result<()> {
        let filter = doc! {
            "contact": &record.contact,
            "channel": bson_of(&record.channel)?,
        };
        self.otps().replace_one(filter, &record).upsert(true).await?;
        Ok(())
    }

    async fn find_otp(&self, contact: &str, channel: OtpChannel) -> Result<Option<OtpRecord>> {
        let filter = doc! { "contact": contact, "channel": bson_of(&channel)? };
        Ok(self.otps().find_one(filter).await?)
    }

    async fn record_otp_failure(&self, contact: &str, channel: OtpChannel) -> Result<()> {
        let filter = doc! { "contact": contact, "channel": bson_of(&channel)? };
        self.otps()
            .update_one(filter, doc! { "$inc": { "attempts": 1 } })
            .await?;
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
        let filter = doc! {
            "contact": contact,
            "channel": bson_of(&channel)?,
            "code": code,
            "expires_at": { "$gt": now },
            "attempts": { "$lt": max_attempts },
        };
        let update = doc! { "$set": { "verified": true, "verified_at": now } };
        let result = self.otps().update_one(filter, update).await?;
        Ok(result.matched_count == 1)
    }

    async fn claim_verified_otp(&self, contact: &str, channel: OtpChannel, since: DateTime) -> Result<Option<OtpRecord>> {
        let filter = doc! {
            "contact": contact,
            "channel": bson_of(&channel)?,
            "verified": true,
            "verified_at": { "$gt": since },
        };
        Ok(self.otps().find_one_and_delete(filter).await?)
    }

    async fn restore_otp(&self, record: OtpRecord) -> Result<()> {
        let filter = doc! {
            "contact": &record.contact,
            "channel": bson_of(&record.channel)?,
        };
        let mut fields = mongodb::bson::to_document(&record)
            .map_err(|e| AppError::internal(format!("BSON conversion failed: {}", e)))?;
        // Filter equality fields are copied into the inserted document
        fields.remove("contact");
        fields.remove("channel");
        self.otps()
            .update_one(filter, doc! { "$setOnInsert": fields })
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn insert_donation(&self, mut donation: Donation) -> Result<Donation> {
        let result = self.donations().insert_one(&donation).await?;
        donation._id = result.inserted_id.as_object_id();
        Ok(donation)
    }

    async fn find_donation(&self, id: ObjectId) -> Result<Option<Donation>> {
        Ok(self.donations().find_one(doc! { "_id": id }).await?)
    }

    async fn list_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>> {
        let mut query = doc! {};
        if let Some(status) = filter.status {
            query.insert("status", bson_of(&status)?);
        }
        if let Some(resort_id) = filter.resort_id {
            query.insert("resort_id", resort_id);
        }
        if let Some(ngo_id) = filter.ngo_id {
            query.insert("ngo_id", ngo_id);
        }

        let cursor = self
            .donations()
            .find(query)
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn accept_donation(&self, id: ObjectId, ngo_id: ObjectId, now: DateTime) -> Result<Donation> {
        for _ in 0..CONDITIONAL_RETRIES {
            let updated = self
                .donations()
                .find_one_and_update(
                    doc! { "_id": id, "status": bson_of(&DonationStatus::Pending)? },
                    doc! { "$set": {
                        "status": bson_of(&DonationStatus::Accepted)?,
                        "ngo_id": ngo_id,
                        "accepted_date": now,
                        "updated_at": now,
                    } },
                )
                .return_document(ReturnDocument::After)
                .await?;
            if let Some(donation) = updated {
                return Ok(donation);
            }
            // Explain the miss with the same rules the update encodes.
            self.load_donation(id).await?.accept(ngo_id, now)?;
        }
        Err(AppError::invalid_state("Donation is being updated concurrently"))
    }

    async fn reject_donation(&self, id: ObjectId, now: DateTime) -> Result<Donation> {
        for _ in 0..CONDITIONAL_RETRIES {
            let updated = self
                .donations()
                .find_one_and_update(
                    doc! { "_id": id, "status": bson_of(&DonationStatus::Pending)? },
                    doc! { "$set": {
                        "status": bson_of(&DonationStatus::Rejected)?,
                        "updated_at": now,
                    } },
                )
                .return_document(ReturnDocument::After)
                .await?;
            if let Some(donation) = updated {
                return Ok(donation);
            }
            self.load_donation(id).await?.reject(now)?;
        }
        Err(AppError::invalid_state("Donation is being updated concurrently"))
    }

    async fn confirm_pickup(&self, id: ObjectId, party: PickupParty, now: DateTime) -> Result<PickupOutcome> {
        let (filter, pipeline) = pickup_confirmation(id, &party, now)?;

        for _ in 0..CONDITIONAL_RETRIES {
            let before = self
                .donations()
                .find_one_and_update(filter.clone(), pipeline.clone())
                .return_document(ReturnDocument::Before)
                .await?;

            if let Some(mut donation) = before {
                // Replaying the step on the pre-image yields exactly what the server wrote.
                let transitioned = donation.confirm_pickup(&party, now)?;
                return Ok(PickupOutcome { donation, transitioned });
            }

            self.load_donation(id).await?.confirm_pickup(&party, now)?;
        }
        Err(AppError::invalid_state("Donation is being updated concurrently"))
    }

    async fn mark_picked(&self, id: ObjectId, party: PickupParty, now: DateTime) -> Result<PickupOutcome> {
        let mut filter = doc! {
            "_id": id,
            "status": bson_of(&DonationStatus::Accepted)?,
            "pickup_status": bson_of(&PickupStatus::Waiting)?,
            "pickup_confirmed_by_resort": true,
            "pickup_confirmed_by_ngo": true,
        };
        filter.insert(party.owner_field(), party.id());
        let update = doc! { "$set": {
            "pickup_status": bson_of(&PickupStatus::Picked)?,
            "pickup_date": now,
            "updated_at": now,
        } };

        for _ in 0..CONDITIONAL_RETRIES {
            let updated = self
                .donations()
                .find_one_and_update(filter.clone(), update.clone())
                .return_document(ReturnDocument::After)
                .await?;
            if let Some(donation) = updated {
                return Ok(PickupOutcome { donation, transitioned: true });
            }

            let current = self.load_donation(id).await?;
            let mut replay = current.clone();
            if !replay.mark_picked(&party, now)? {
                // Already Picked by someone else
                return Ok(PickupOutcome { donation: current, transitioned: false });
            }
        }
        Err(AppError::invalid_state("Donation is being updated concurrently"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_is_bound_to_the_calling_side() {
        let (id, ngo) = (ObjectId::new(), ObjectId::new());
        let (filter, _) = pickup_confirmation(id, &PickupParty::Ngo(ngo), DateTime::now()).unwrap();

        assert_eq!(filter.get_object_id("_id").unwrap(), id);
        assert_eq!(filter.get_object_id("ngo_id").unwrap(), ngo);
        assert!(!filter.contains_key("resort_id"));
        assert_eq!(filter.get_str("status").unwrap(), "Accepted");
        assert_eq!(filter.get_str("pickup_status").unwrap(), "Waiting");
    }

    #[test]
    fn picked_is_conditioned_on_the_other_flag() {
        let resort = ObjectId::new();
        let now = DateTime::now();
        let (filter, pipeline) = pickup_confirmation(ObjectId::new(), &PickupParty::Resort(resort), now).unwrap();
        assert_eq!(filter.get_object_id("resort_id").unwrap(), resort);

        // A single stage, so flag write and transition land together
        assert_eq!(pipeline.len(), 1);
        let set = pipeline[0].get_document("$set").unwrap();
        assert_eq!(set.get_bool("pickup_confirmed_by_resort").unwrap(), true);
        assert!(!set.contains_key("pickup_confirmed_by_ngo"));

        let expected_guard = doc! { "$eq": ["$pickup_confirmed_by_ngo", true] };
        let status = set.get_document("pickup_status").unwrap().get_array("$cond").unwrap();
        assert_eq!(status[0], Bson::Document(expected_guard.clone()));
        assert_eq!(status[1], Bson::String("Picked".into()));
        assert_eq!(status[2], Bson::String("$pickup_status".into()));

        let date = set.get_document("pickup_date").unwrap().get_array("$cond").unwrap();
        assert_eq!(date[0], Bson::Document(expected_guard));
        assert_eq!(date[1], Bson::DateTime(now));
        assert_eq!(date[2], Bson::String("$pickup_date".into()));
    }
}
