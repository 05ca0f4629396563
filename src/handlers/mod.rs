pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod auth_otp;
pub(crate) mod donations;
pub(crate) mod health;
pub(crate) mod pickup;
