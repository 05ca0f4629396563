use std::sync::Arc;

use chrono::Duration;

use crate::config::AppConfig;
use crate::services::{
    account_service::AccountService, donation_service::DonationService, notifier::Notifier,
    otp_service::OTPService, token_service::TokenService,
};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub otp_service: OTPService,
    pub tokens: TokenService,
    pub accounts: AccountService,
    pub donations: DonationService,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        let otp_service = OTPService::new(
            store.clone(),
            notifier.clone(),
            config.otp_ttl(),
            config.otp_max_attempts,
        );
        let tokens = TokenService::new(&config.jwt_secret, Duration::minutes(config.token_ttl_minutes));
        let accounts = AccountService::new(
            store.clone(),
            notifier,
            otp_service.clone(),
            tokens.clone(),
            config.admin_email.clone(),
            config.otp_verified_window(),
            config.bcrypt_cost,
        );
        let donations = DonationService::new(store.clone());

        AppState {
            store,
            otp_service,
            tokens,
            accounts,
            donations,
        }
    }
}
