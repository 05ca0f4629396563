pub mod donation;
pub mod entity;
pub mod otp;
