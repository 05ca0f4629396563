use axum::{extract::State, response::Json};

use crate::dtos::responses::MessageResponse;
use crate::errors::{AppError, Result};
use crate::models::entity::normalize_email;
use crate::models::otp::{OtpChannel, SendEmailOtp, SendPhoneOtp, VerifyEmailOtp, VerifyPhoneOtp};
use crate::state::AppState;

fn required(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_data(format!("{} is required", what)));
    }
    Ok(())
}

// 1. Email OTP
pub async fn send_email_otp(
    State(state): State<AppState>,
    Json(req): Json<SendEmailOtp>,
) -> Result<Json<MessageResponse>> {
    required(&req.email, "email")?;
    state
        .otp_service
        .send_otp(&normalize_email(&req.email), OtpChannel::Email)
        .await?;
    Ok(Json(MessageResponse::ok("OTP sent successfully")))
}

pub async fn verify_email_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailOtp>,
) -> Result<Json<MessageResponse>> {
    required(&req.email, "email")?;
    state
        .otp_service
        .verify_otp(&normalize_email(&req.email), OtpChannel::Email, &req.otp)
        .await?;
    Ok(Json(MessageResponse::ok("Email verified successfully")))
}

// 2. Phone OTP
pub async fn send_phone_otp(
    State(state): State<AppState>,
    Json(req): Json<SendPhoneOtp>,
) -> Result<Json<MessageResponse>> {
    required(&req.phone_no, "phone_no")?;
    state
        .otp_service
        .send_otp(req.phone_no.trim(), OtpChannel::Phone)
        .await?;
    Ok(Json(MessageResponse::ok("OTP sent successfully")))
}

pub async fn verify_phone_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyPhoneOtp>,
) -> Result<Json<MessageResponse>> {
    required(&req.phone_no, "phone_no")?;
    state
        .otp_service
        .verify_otp(req.phone_no.trim(), OtpChannel::Phone, &req.otp)
        .await?;
    Ok(Json(MessageResponse::ok("Phone number verified successfully")))
}
