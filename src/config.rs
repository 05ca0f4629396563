// config.rs
use std::env;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub api_key: String,
    pub username: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub otp_ttl_minutes: i64,
    pub otp_max_attempts: i32,
    pub otp_verified_window_minutes: i64,
    pub bcrypt_cost: u32,
    pub admin_email: String,
    pub admin_password: Option<String>,
    pub sms: Option<SmsConfig>,
    pub smtp: Option<SmtpConfig>,
    pub port: u16,
    pub host: String,
}

// Non-empty env var or None
fn get_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match get_env(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::configuration(format!("{} must be a number", key))),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let store_backend = match get_env("STORE").as_deref() {
            Some("memory") => StoreBackend::Memory,
            _ => StoreBackend::Mongo,
        };

        let database_url = match (store_backend, get_env("DATABASE_URL")) {
            (_, Some(url)) => url,
            (StoreBackend::Memory, None) => String::new(),
            (StoreBackend::Mongo, None) => {
                return Err(AppError::configuration("DATABASE_URL must be set"))
            }
        };

        let jwt_secret = get_env("JWT_SECRET")
            .ok_or_else(|| AppError::configuration("JWT_SECRET must be set"))?;

        let sms = get_env("SMS_API_KEY").map(|api_key| SmsConfig {
            api_key,
            username: get_env("SMS_USERNAME").unwrap_or_else(|| "sandbox".to_string()),
            from: get_env("SMS_FROM").unwrap_or_else(|| "SurplusSmile".to_string()),
        });

        let smtp = match (
            get_env("SMTP_HOST"),
            get_env("SMTP_USERNAME"),
            get_env("SMTP_PASSWORD"),
            get_env("SMTP_FROM_EMAIL"),
        ) {
            (Some(host), Some(username), Some(password), Some(from_email)) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", 465)?,
                username,
                password,
                from_email,
            }),
            _ => None,
        };

        Ok(AppConfig {
            store_backend,
            database_url,
            database_name: get_env("DATABASE_NAME").unwrap_or_else(|| "surplus_smile".to_string()),
            jwt_secret,
            token_ttl_minutes: parse_env("TOKEN_TTL_MINUTES", 60)?,
            otp_ttl_minutes: parse_env("OTP_TTL_MINUTES", 5)?,
            otp_max_attempts: parse_env("OTP_MAX_ATTEMPTS", 5)?,
            otp_verified_window_minutes: parse_env("OTP_VERIFIED_WINDOW_MINUTES", 30)?,
            bcrypt_cost: parse_env("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            admin_email: get_env("ADMIN_EMAIL").unwrap_or_else(|| "admin@surplussmile.org".to_string()),
            admin_password: get_env("ADMIN_PASSWORD"),
            sms,
            smtp,
            port: parse_env("PORT", 5000)?,
            host: get_env("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        })
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.otp_ttl_minutes)
    }

    pub fn otp_verified_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.otp_verified_window_minutes)
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "store": format!("{:?}", self.store_backend),
            "database_name": self.database_name,
            "token_ttl_minutes": self.token_ttl_minutes,
            "otp_ttl_minutes": self.otp_ttl_minutes,
            "sms_configured": self.sms.is_some(),
            "smtp_configured": self.smtp.is_some(),
            "admin_email": self.admin_email,
            "port": self.port,
            "host": self.host,
        })
    }
}

#[cfg(test)]
impl AppConfig {
    /// Fast, self-contained settings for tests.
    pub fn for_tests() -> Self {
        AppConfig {
            store_backend: StoreBackend::Memory,
            database_url: String::new(),
            database_name: "surplus_smile_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_minutes: 60,
            otp_ttl_minutes: 5,
            otp_max_attempts: 5,
            otp_verified_window_minutes: 30,
            bcrypt_cost: 4,
            admin_email: "approver@surplussmile.test".to_string(),
            admin_password: None,
            sms: None,
            smtp: None,
            port: 0,
            host: "127.0.0.1".to_string(),
        }
    }
}
