use std::sync::{Arc, OnceLock};

use bcrypt::{hash, verify};
use chrono::Duration;
use mongodb::bson::{oid::ObjectId, DateTime};
use rand::{distributions::Alphanumeric, Rng};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::entity::{
    normalize_email, ApprovalStatus, Entity, LoginRequest, RegisterEntity, Role,
};
use crate::models::otp::OtpChannel;
use crate::services::notifier::Notifier;
use crate::services::otp_service::OTPService;
use crate::services::token_service::TokenService;
use crate::store::Store;

/// Registration, approval and login for every actor.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    otp: OTPService,
    tokens: TokenService,
    approver_email: String,
    verified_window: Duration,
    bcrypt_cost: u32,
    // Checked against on login misses so they cost as much as a wrong password
    decoy_hash: Arc<OnceLock<String>>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        otp: OTPService,
        tokens: TokenService,
        approver_email: String,
        verified_window: Duration,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            store,
            notifier,
            otp,
            tokens,
            approver_email,
            verified_window,
            bcrypt_cost,
            decoy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Create a Pending entity once both contacts have been proven. No token is issued.
    pub async fn register(&self, role: Role, payload: RegisterEntity) -> Result<Entity> {
        payload.validate()?;
        let entity = Entity::pending(role, &payload);

        if self.store.find_entity_by_email(role, &entity.email).await?.is_some() {
            return Err(AppError::Conflict(format!("{} already registered", role.label())));
        }

        // Claimed email first, then phone: two requests racing for the same
        // pair can never each hold one half.
        let email_proof = self
            .otp
            .claim_verification(&entity.email, OtpChannel::Email, self.verified_window)
            .await?
            .ok_or(AppError::Unverified(OtpChannel::Email))?;
        let phone_proof = match self
            .otp
            .claim_verification(&entity.phone_no, OtpChannel::Phone, self.verified_window)
            .await?
        {
            Some(proof) => proof,
            None => {
                self.otp.release(email_proof).await?;
                return Err(AppError::Unverified(OtpChannel::Phone));
            }
        };

        let entity = match self.store.insert_entity(entity).await {
            Ok(entity) => entity,
            Err(e) => {
                for proof in [email_proof, phone_proof] {
                    if let Err(release_err) = self.otp.release(proof).await {
                        tracing::warn!(error = %release_err, "Failed to hand back OTP verification");
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(role = role.as_str(), email = %entity.email, "📝 Registration pending approval");

        let subject = format!("New {} Registration Pending Approval", role.label());
        if let Err(e) = self
            .notifier
            .send_email(&self.approver_email, &subject, &approval_request_body(&entity))
            .await
        {
            tracing::warn!(error = %e, "Failed to notify approver, registration kept");
        }

        Ok(entity)
    }

    /// Returns a signed token for an approved entity with a matching password.
    pub async fn login(&self, role: Role, payload: LoginRequest) -> Result<(String, Entity)> {
        payload.validate()?;
        let email = normalize_email(&payload.email);

        let entity = self
            .store
            .find_entity_by_email(role, &email)
            .await?
            .filter(|e| e.approval_status == ApprovalStatus::Approved);

        let (entity, password_hash) = match entity {
            Some(entity) => match entity.password_hash.clone() {
                Some(stored) => (entity, stored),
                None => return Err(self.reject_login(&payload.password)),
            },
            None => return Err(self.reject_login(&payload.password)),
        };

        // bcrypt compares digests in constant time
        if !verify(&payload.password, &password_hash)? {
            tracing::warn!(role = role.as_str(), "Login rejected");
            return Err(AppError::Unauthorized);
        }

        let token = self.tokens.issue(&entity)?;
        tracing::info!(role = role.as_str(), email = %entity.email, "🔑 Login successful");
        Ok((token, entity))
    }

    pub async fn list(&self, role: Role, status: Option<ApprovalStatus>) -> Result<Vec<Entity>> {
        self.store.list_entities(role, status).await
    }

    /// Approve a Pending entity and issue its credentials. A password is
    /// generated and mailed when the approver does not supply one.
    pub async fn approve(&self, role: Role, id: ObjectId, password: Option<String>) -> Result<Entity> {
        let generated = password.is_none();
        let password = password.unwrap_or_else(generate_password);
        let password_hash = hash(&password, self.bcrypt_cost)?;

        let entity = self
            .store
            .decide_approval(role, id, ApprovalStatus::Approved, Some(password_hash))
            .await?;

        let body = if generated {
            format!(
                "Dear {},\n\nYour {} account has been approved.\n\n\
                 Login email: {}\nTemporary password: {}\n\nRegards,\nSurplusSmile Team",
                entity.name,
                role.label(),
                entity.email,
                password
            )
        } else {
            format!(
                "Dear {},\n\nYour {} account has been approved. You can now log in.\n\n\
                 Regards,\nSurplusSmile Team",
                entity.name,
                role.label()
            )
        };
        if let Err(e) = self
            .notifier
            .send_email(&entity.email, "Your account has been approved", &body)
            .await
        {
            tracing::error!(error = %e, email = %entity.email, "Failed to send approval email");
        }

        tracing::info!(role = role.as_str(), email = %entity.email, "✅ Entity approved");
        Ok(entity)
    }

    pub async fn reject(&self, role: Role, id: ObjectId) -> Result<Entity> {
        let entity = self
            .store
            .decide_approval(role, id, ApprovalStatus::Rejected, None)
            .await?;

        let body = format!(
            "Dear {},\n\nWe are unable to approve your {} registration at this time.\n\n\
             Regards,\nSurplusSmile Team",
            entity.name,
            role.label()
        );
        if let Err(e) = self
            .notifier
            .send_email(&entity.email, "Registration update", &body)
            .await
        {
            tracing::warn!(error = %e, "Failed to send rejection email");
        }

        tracing::info!(role = role.as_str(), email = %entity.email, "Entity rejected");
        Ok(entity)
    }

    /// Make sure an approved admin account exists for `email`.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<()> {
        let email = normalize_email(email);
        if self.store.find_entity_by_email(Role::Admin, &email).await?.is_some() {
            return Ok(());
        }

        let now = DateTime::now();
        let admin = Entity {
            _id: None,
            role: Role::Admin,
            name: "Administrator".to_string(),
            email,
            phone_no: String::new(),
            location: String::new(),
            address: String::new(),
            is_certified: None,
            approval_status: ApprovalStatus::Approved,
            password_hash: Some(hash(password, self.bcrypt_cost)?),
            created_at: now,
            updated_at: now,
        };
        match self.store.insert_entity(admin).await {
            // Another instance created it first
            Ok(_) | Err(AppError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl AccountService {
    // Same bcrypt work as a real password check, whatever the outcome.
    fn reject_login(&self, password: &str) -> AppError {
        let decoy = self
            .decoy_hash
            .get_or_init(|| hash(generate_password(), self.bcrypt_cost).unwrap_or_default());
        let _ = verify(password, decoy);
        AppError::Unauthorized
    }
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

fn approval_request_body(entity: &Entity) -> String {
    let certified = match entity.is_certified {
        Some(true) => "\n🔹 Certified: Yes",
        Some(false) => "\n🔹 Certified: No",
        None => "",
    };
    format!(
        "Dear Admin,\n\n\
         A new {role} has registered and is awaiting approval. Please review the details:\n\n\
         🔹 Name: {name}\n\
         🔹 Email: {email}\n\
         🔹 Location: {location}\n\
         🔹 Address: {address}\n\
         🔹 Phone Number: {phone}{certified}\n\n\
         Please log in to the admin panel to approve.\n\n\
         Regards,\nSurplusSmile Team",
        role = entity.role.label(),
        name = entity.name,
        email = entity.email,
        location = entity.location,
        address = entity.address,
        phone = entity.phone_no,
        certified = certified,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestHarness;

    fn ngo_payload() -> RegisterEntity {
        RegisterEntity {
            name: "Helping Hands".into(),
            email: "contact@helpinghands.org".into(),
            location: "Goa".into(),
            phone_no: "+15550100".into(),
            is_certified: Some(true),
            address: Some("12 Market St".into()),
        }
    }

    #[tokio::test]
    async fn registration_requires_both_channels() {
        let h = TestHarness::new();
        let accounts = &h.state.accounts;

        // Neither verified
        let err = accounts.register(Role::Ngo, ngo_payload()).await.unwrap_err();
        assert!(matches!(err, AppError::Unverified(OtpChannel::Email)));

        // Only email verified
        h.verify_contact("contact@helpinghands.org", OtpChannel::Email).await;
        let err = accounts.register(Role::Ngo, ngo_payload()).await.unwrap_err();
        assert!(matches!(err, AppError::Unverified(OtpChannel::Phone)));

        // Only phone verified
        let h = TestHarness::new();
        h.verify_contact("+15550100", OtpChannel::Phone).await;
        let err = h.state.accounts.register(Role::Ngo, ngo_payload()).await.unwrap_err();
        assert!(matches!(err, AppError::Unverified(OtpChannel::Email)));
    }

    #[tokio::test]
    async fn registration_creates_pending_entity_and_consumes_otps() {
        let h = TestHarness::new();
        h.verify_contact("contact@helpinghands.org", OtpChannel::Email).await;
        h.verify_contact("+15550100", OtpChannel::Phone).await;

        let entity = h.state.accounts.register(Role::Ngo, ngo_payload()).await.unwrap();
        assert_eq!(entity.approval_status, ApprovalStatus::Pending);
        assert!(entity.password_hash.is_none());

        assert!(h.store.find_otp("contact@helpinghands.org", OtpChannel::Email).await.unwrap().is_none());
        assert!(h.store.find_otp("+15550100", OtpChannel::Phone).await.unwrap().is_none());

        let mails = h.notifier.emails_to("approver@surplussmile.test");
        assert_eq!(mails.len(), 1);
        assert!(mails[0].contains("Helping Hands"));
        assert!(mails[0].contains("Certified: Yes"));
    }

    #[tokio::test]
    async fn approver_outage_does_not_fail_registration() {
        let h = TestHarness::new();
        h.verify_contact("contact@helpinghands.org", OtpChannel::Email).await;
        h.verify_contact("+15550100", OtpChannel::Phone).await;
        h.notifier.fail_deliveries(true);

        assert!(h.state.accounts.register(Role::Ngo, ngo_payload()).await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let h = TestHarness::new();
        h.register_approved(Role::Ngo, "contact@helpinghands.org", "+15550100", "hunter22!").await;

        let err = h.state.accounts.register(Role::Ngo, ngo_payload()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "NGO already registered"));
    }

    #[tokio::test]
    async fn login_does_not_distinguish_unknown_from_unapproved() {
        let h = TestHarness::new();
        h.verify_contact("contact@helpinghands.org", OtpChannel::Email).await;
        h.verify_contact("+15550100", OtpChannel::Phone).await;
        h.state.accounts.register(Role::Ngo, ngo_payload()).await.unwrap();

        let attempt = |email: &str| LoginRequest {
            email: email.into(),
            password: "whatever-123".into(),
        };
        let unapproved = h.state.accounts.login(Role::Ngo, attempt("contact@helpinghands.org")).await.unwrap_err();
        let unknown = h.state.accounts.login(Role::Ngo, attempt("nobody@nowhere.org")).await.unwrap_err();

        assert!(matches!(unapproved, AppError::Unauthorized));
        assert!(matches!(unknown, AppError::Unauthorized));
        assert_eq!(unapproved.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn approved_login_issues_token() {
        let h = TestHarness::new();
        h.register_approved(Role::Ngo, "contact@helpinghands.org", "+15550100", "hunter22!").await;

        let (token, entity) = h
            .state
            .accounts
            .login(Role::Ngo, LoginRequest { email: "Contact@HelpingHands.org".into(), password: "hunter22!".into() })
            .await
            .unwrap();
        let claims = h.state.tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, entity._id.unwrap().to_hex());

        let err = h
            .state
            .accounts
            .login(Role::Ngo, LoginRequest { email: "contact@helpinghands.org".into(), password: "wrong-pass".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn approval_without_password_mails_generated_credentials() {
        let h = TestHarness::new();
        h.verify_contact("contact@helpinghands.org", OtpChannel::Email).await;
        h.verify_contact("+15550100", OtpChannel::Phone).await;
        let entity = h.state.accounts.register(Role::Ngo, ngo_payload()).await.unwrap();

        h.state.accounts.approve(Role::Ngo, entity._id.unwrap(), None).await.unwrap();

        let mail = h.notifier.emails_to("contact@helpinghands.org").pop().unwrap();
        let password = mail
            .lines()
            .find_map(|l| l.strip_prefix("Temporary password: "))
            .unwrap()
            .to_string();
        assert_eq!(password.len(), 12);
        assert!(h
            .state
            .accounts
            .login(Role::Ngo, LoginRequest { email: "contact@helpinghands.org".into(), password })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn decided_entities_cannot_be_approved_again() {
        let h = TestHarness::new();
        h.verify_contact("contact@helpinghands.org", OtpChannel::Email).await;
        h.verify_contact("+15550100", OtpChannel::Phone).await;
        let entity = h.state.accounts.register(Role::Ngo, ngo_payload()).await.unwrap();
        let id = entity._id.unwrap();

        h.state.accounts.reject(Role::Ngo, id).await.unwrap();
        let err = h.state.accounts.approve(Role::Ngo, id, Some("hunter22!".into())).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let h = TestHarness::new();
        h.state.accounts.ensure_admin("root@surplussmile.test", "admin-pass-1").await.unwrap();
        h.state.accounts.ensure_admin("root@surplussmile.test", "admin-pass-2").await.unwrap();

        let admins = h.state.accounts.list(Role::Admin, None).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert!(h
            .state
            .accounts
            .login(Role::Admin, LoginRequest { email: "root@surplussmile.test".into(), password: "admin-pass-1".into() })
            .await
            .is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_verification_registers_one_account() {
        for _ in 0..50 {
            let h = TestHarness::new();
            h.verify_contact("contact@helpinghands.org", OtpChannel::Email).await;
            h.verify_contact("+15550100", OtpChannel::Phone).await;

            // Same proven contacts, racing into two different role collections
            let barrier = Arc::new(tokio::sync::Barrier::new(2));
            let mut tasks = Vec::new();
            for role in [Role::Ngo, Role::Resort] {
                let (accounts, barrier) = (h.state.accounts.clone(), barrier.clone());
                tasks.push(tokio::spawn(async move {
                    barrier.wait().await;
                    accounts.register(role, ngo_payload()).await
                }));
            }

            let mut registered = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(_) => registered += 1,
                    Err(e) => assert!(matches!(e, AppError::Unverified(_)), "{e}"),
                }
            }
            assert_eq!(registered, 1);
        }
    }

    #[tokio::test]
    async fn login_misses_still_run_a_password_check() {
        let h = TestHarness::new();
        let attempt = LoginRequest { email: "nobody@nowhere.org".into(), password: "whatever-123".into() };
        assert!(h.state.accounts.decoy_hash.get().is_none());

        let err = h.state.accounts.login(Role::Ngo, attempt).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        let decoy = h.state.accounts.decoy_hash.get().unwrap();
        assert!(decoy.starts_with("$2"));
    }
}
