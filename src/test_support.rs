//! Shared fixtures for unit and router tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::entity::{RegisterEntity, Role};
use crate::models::otp::OtpChannel;
use crate::services::notifier::Notifier;
use crate::state::AppState;
use crate::store::MemoryStore;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

/// Captures outbound messages instead of delivering them.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_deliveries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, message: SentMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::upstream("provider unavailable"));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    pub fn emails_to(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.to == to && m.subject.is_some())
            .map(|m| m.body.clone())
            .collect()
    }

    /// The 6-digit code in the latest message sent to `to`.
    pub fn last_code(&self, to: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let message = sent.iter().rev().find(|m| m.to == to)?;
        message
            .body
            .split(|c: char| !c.is_ascii_digit())
            .find(|run| run.len() == 6)
            .map(str::to_string)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.record(SentMessage {
            to: to.to_string(),
            subject: Some(subject.to_string()),
            body: body.to_string(),
        })
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        self.record(SentMessage {
            to: to.to_string(),
            subject: None,
            body: body.to_string(),
        })
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(&AppConfig::for_tests(), store.clone(), notifier.clone());
        Self { state, store, notifier }
    }

    /// Run the send/verify OTP exchange for a contact.
    pub async fn verify_contact(&self, contact: &str, channel: OtpChannel) {
        self.state.otp_service.send_otp(contact, channel).await.unwrap();
        let code = self.notifier.last_code(contact).unwrap();
        self.state
            .otp_service
            .verify_otp(contact, channel, &code)
            .await
            .unwrap();
    }

    /// Register, verify and approve an entity; returns its id.
    pub async fn register_approved(&self, role: Role, email: &str, phone: &str, password: &str) -> ObjectId {
        self.verify_contact(email, OtpChannel::Email).await;
        self.verify_contact(phone, OtpChannel::Phone).await;
        let entity = self
            .state
            .accounts
            .register(
                role,
                RegisterEntity {
                    name: format!("{} {}", role.label(), email),
                    email: email.to_string(),
                    location: "Goa".to_string(),
                    phone_no: phone.to_string(),
                    is_certified: Some(true),
                    address: None,
                },
            )
            .await
            .unwrap();
        let id = entity._id.unwrap();
        self.state
            .accounts
            .approve(role, id, Some(password.to_string()))
            .await
            .unwrap();
        id
    }
}
