use std::sync::Arc;

use chrono::Duration;
use mongodb::bson::DateTime;
use rand::Rng;
use subtle::ConstantTimeEq;

use crate::errors::{AppError, Result};
use crate::models::otp::{OtpChannel, OtpRecord};
use crate::services::notifier::Notifier;
use crate::store::Store;

/// Owns the (contact, channel) → code mapping. All state lives in the store.
#[derive(Clone)]
pub struct OTPService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    ttl: Duration,
    max_attempts: i32,
}

impl OTPService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, ttl: Duration, max_attempts: i32) -> Self {
        Self { store, notifier, ttl, max_attempts }
    }

    // Generate 6-digit OTP
    pub fn generate_otp() -> String {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(0..1_000_000))
    }

    /// Issue a fresh code for `contact`, replacing any earlier one, and deliver it.
    pub async fn send_otp(&self, contact: &str, channel: OtpChannel) -> Result<()> {
        let code = Self::generate_otp();
        self.store
            .replace_otp(OtpRecord::new(contact, channel, &code, self.ttl))
            .await?;

        let minutes = self.ttl.num_minutes();
        match channel {
            OtpChannel::Email => {
                let body = format!(
                    "Your SurplusSmile verification code is: {}\n\n\
                     It is valid for {} minutes. If you didn't request this, you can ignore this email.",
                    code, minutes
                );
                self.notifier
                    .send_email(contact, "Your verification code", &body)
                    .await?;
            }
            OtpChannel::Phone => {
                let body = format!(
                    "Your SurplusSmile verification code is: {}. Valid for {} minutes.",
                    code, minutes
                );
                self.notifier.send_sms(contact, &body).await?;
            }
        }

        tracing::info!(channel = channel.as_str(), "OTP issued");
        Ok(())
    }

    /// Check `submitted` against the active code for `contact` and mark the record verified.
    pub async fn verify_otp(&self, contact: &str, channel: OtpChannel, submitted: &str) -> Result<()> {
        let record = self
            .store
            .find_otp(contact, channel)
            .await?
            .ok_or(AppError::OtpSessionNotFound)?;

        let matches: bool = record.code.as_bytes().ct_eq(submitted.trim().as_bytes()).into();
        if !matches {
            self.store.record_otp_failure(contact, channel).await?;
            tracing::warn!(channel = channel.as_str(), attempts = record.attempts + 1, "OTP rejected");
            return Err(AppError::InvalidOrExpired);
        }

        // Confirms the code we compared, not whatever the record holds now:
        // a resend, claim or concurrent failure in between makes this miss.
        let confirmed = self
            .store
            .confirm_otp(contact, channel, &record.code, DateTime::now(), self.max_attempts)
            .await?;
        if !confirmed {
            tracing::warn!(channel = channel.as_str(), "OTP no longer valid");
            return match self.store.find_otp(contact, channel).await? {
                Some(_) => Err(AppError::InvalidOrExpired),
                None => Err(AppError::OtpSessionNotFound),
            };
        }

        tracing::info!(channel = channel.as_str(), "OTP verified");
        Ok(())
    }

    /// Take ownership of a verification for registration. Returns `None` when
    /// there is none within `window` or another request already took it.
    pub async fn claim_verification(
        &self,
        contact: &str,
        channel: OtpChannel,
        window: Duration,
    ) -> Result<Option<OtpRecord>> {
        let since = DateTime::from_chrono(chrono::Utc::now() - window);
        self.store.claim_verified_otp(contact, channel, since).await
    }

    /// Hand back a claimed verification after a failed registration.
    pub async fn release(&self, record: OtpRecord) -> Result<()> {
        self.store.restore_otp(record).await
    }
}
