use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Contact channel an OTP was sent over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpChannel {
    Email,
    Phone,
}

impl OtpChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpChannel::Email => "email",
            OtpChannel::Phone => "phone",
        }
    }

    /// Human label used in "... not verified" messages.
    pub fn label(&self) -> &'static str {
        match self {
            OtpChannel::Email => "Email",
            OtpChannel::Phone => "Phone number",
        }
    }
}

/// One verification session per (contact, channel). Re-sending overwrites it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OtpRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub contact: String,
    pub channel: OtpChannel,
    pub code: String,         // 6-digit OTP
    pub verified: bool,
    pub attempts: i32,        // Failed attempts against the current code
    pub expires_at: DateTime, // Code validity window end
    pub verified_at: Option<DateTime>,
    pub created_at: DateTime,
}

impl OtpRecord {
    pub fn new(contact: &str, channel: OtpChannel, code: &str, ttl: chrono::Duration) -> Self {
        let now = chrono::Utc::now();
        Self {
            _id: None,
            contact: contact.to_string(),
            channel,
            code: code.to_string(),
            verified: false,
            attempts: 0,
            expires_at: DateTime::from_chrono(now + ttl),
            verified_at: None,
            created_at: DateTime::from_chrono(now),
        }
    }

    pub fn is_expired(&self, now: DateTime) -> bool {
        self.expires_at <= now
    }

    /// Whether a registration may still rely on this record.
    pub fn verified_since(&self, since: DateTime) -> bool {
        self.verified && self.verified_at.map_or(false, |at| at > since)
    }

    /// Whether `code` may still be confirmed against this record.
    pub fn accepts(&self, code: &str, now: DateTime, max_attempts: i32) -> bool {
        self.code == code && !self.is_expired(now) && self.attempts < max_attempts
    }
}

#[derive(Debug, Deserialize)]
pub struct SendEmailOtp {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailOtp {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct SendPhoneOtp {
    pub phone_no: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPhoneOtp {
    pub phone_no: String,
    pub otp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fresh_record_is_unverified_and_unexpired() {
        let record = OtpRecord::new("+15550001", OtpChannel::Phone, "123456", Duration::minutes(5));
        assert!(!record.verified);
        assert!(!record.is_expired(DateTime::now()));
        assert!(!record.verified_since(window_start(30)));
        assert!(record.accepts("123456", DateTime::now(), 5));
        assert!(!record.accepts("654321", DateTime::now(), 5));
    }

    fn window_start(minutes: i64) -> DateTime {
        DateTime::from_chrono(chrono::Utc::now() - Duration::minutes(minutes))
    }

    #[test]
    fn verification_window_elapses() {
        let mut record = OtpRecord::new("a@b.org", OtpChannel::Email, "123456", Duration::minutes(5));
        record.verified = true;
        record.verified_at = Some(DateTime::from_chrono(chrono::Utc::now() - Duration::minutes(31)));
        assert!(!record.verified_since(window_start(30)));

        record.verified_at = Some(DateTime::now());
        assert!(record.verified_since(window_start(30)));
    }

    #[test]
    fn capped_record_refuses_even_the_right_code() {
        let mut record = OtpRecord::new("+1555", OtpChannel::Phone, "424242", Duration::minutes(5));
        record.attempts = 5;
        assert!(!record.accepts("424242", DateTime::now(), 5));
    }
}
