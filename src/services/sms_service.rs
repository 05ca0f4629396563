use reqwest::Client;
use serde::Deserialize;

use crate::config::SmsConfig;
use crate::errors::{AppError, Result};

const MESSAGING_URL: &str = "https://api.africastalking.com/version1/messaging";

#[derive(Debug, Deserialize)]
struct MessagingReply {
    #[serde(rename = "SMSMessageData")]
    data: MessageData,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    #[serde(rename = "Recipients", default)]
    recipients: Vec<Recipient>,
}

#[derive(Debug, Deserialize)]
struct Recipient {
    number: String,
    status: String,
}

/// Africa's Talking bulk messaging client.
#[derive(Clone)]
pub struct SMSService {
    config: SmsConfig,
    client: Client,
}

impl SMSService {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub async fn send(&self, phone: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(MESSAGING_URL)
            .header("apiKey", &self.config.api_key)
            .header("Accept", "application/json")
            .form(&[
                ("username", self.config.username.as_str()),
                ("to", phone),
                ("message", message),
                ("from", self.config.from.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("SMS API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream(format!("SMS provider returned {}", status)));
        }

        // A 2xx can still carry a per-recipient rejection
        let reply: MessagingReply = response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("Unreadable SMS provider reply: {}", e)))?;
        match reply.data.recipients.first() {
            Some(r) if r.status == "Success" => {
                tracing::info!(phone = %r.number, "SMS dispatched");
                Ok(())
            }
            Some(r) => Err(AppError::upstream(format!("SMS to {} rejected: {}", r.number, r.status))),
            None => Err(AppError::upstream("SMS provider accepted no recipients")),
        }
    }
}
