//! Outbound email/SMS. Callers treat delivery as fire-and-forget and decide
//! themselves whether a failure is fatal.

use async_trait::async_trait;

use crate::errors::Result;
use crate::services::{email_service::EmailService, sms_service::SMSService};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()>;

    async fn send_sms(&self, to: &str, body: &str) -> Result<()>;
}

/// Routes each channel to its provider, or to the log when a provider is not configured.
pub struct NotificationGateway {
    email: Option<EmailService>,
    sms: Option<SMSService>,
}

impl NotificationGateway {
    pub fn new(email: Option<EmailService>, sms: Option<SMSService>) -> Self {
        if email.is_none() {
            tracing::warn!("SMTP not configured, emails will be written to the log");
        }
        if sms.is_none() {
            tracing::warn!("SMS provider not configured, messages will be written to the log");
        }
        Self { email, sms }
    }
}

#[async_trait]
impl Notifier for NotificationGateway {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        match &self.email {
            Some(email) => email.send(to, subject, body).await,
            None => {
                tracing::info!(to = %to, subject = %subject, body = %body, "📧 [console] email");
                Ok(())
            }
        }
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        match &self.sms {
            Some(sms) => sms.send(to, body).await,
            None => {
                tracing::info!(to = %to, body = %body, "📱 [console] sms");
                Ok(())
            }
        }
    }
}
