use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

mod config;
mod database;
mod dtos;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
mod store;
#[cfg(test)]
mod test_support;

use config::{AppConfig, StoreBackend};
use database::{connection::get_db_client, MongoStore};
use services::{email_service::EmailService, notifier::NotificationGateway, sms_service::SMSService};
use state::AppState;
use store::{MemoryStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!("⚙️ Configuration loaded: {}", config.get_config_info());

    let store = initialize_store(&config).await?;
    let app_state = initialize_app_state(&config, store)?;

    if let Some(password) = &config.admin_password {
        app_state
            .accounts
            .ensure_admin(&config.admin_email, password)
            .await
            .context("failed to bootstrap admin account")?;
    }

    let app = routes::build_router(app_state);
    start_server(&config, app).await
}

async fn initialize_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Mongo => {
            let db = get_db_client(config)
                .await
                .context("failed to connect to MongoDB")?;
            Ok(Arc::new(MongoStore::new(db)))
        }
        StoreBackend::Memory => {
            tracing::warn!("🧪 Using in-memory store, data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn initialize_app_state(config: &AppConfig, store: Arc<dyn Store>) -> anyhow::Result<AppState> {
    let email = match config.smtp.clone() {
        Some(smtp) => {
            let service = EmailService::new(smtp).context("failed to set up SMTP transport")?;
            tracing::info!("✅ Email service initialized");
            Some(service)
        }
        None => None,
    };

    let sms = match config.sms.clone() {
        Some(sms) => {
            tracing::info!("✅ SMS service initialized");
            Some(SMSService::new(sms))
        }
        None => None,
    };

    let notifier = Arc::new(NotificationGateway::new(email, sms));
    Ok(AppState::new(config, store, notifier))
}

async fn start_server(config: &AppConfig, app: axum::Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("🚀 Server starting on {}", addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
