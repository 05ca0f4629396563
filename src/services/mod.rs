pub mod account_service;
pub mod donation_service;
pub mod email_service;
pub mod notifier;
pub mod otp_service;
pub mod sms_service;
pub mod token_service;
