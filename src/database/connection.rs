use mongodb::{bson::doc, options::IndexOptions, Client, Database, IndexModel};

use crate::config::AppConfig;
use crate::errors::Result;
use crate::models::entity::Role;

pub async fn get_db_client(config: &AppConfig) -> Result<Database> {
    let client = Client::with_uri_str(&config.database_url).await?;
    let db = client.database(&config.database_name);

    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!(database = %config.database_name, ?collections, "✅ Connected to database");
        }
        Err(e) => {
            tracing::error!("❌ Database '{}' may not exist or is inaccessible: {}", config.database_name, e);
            return Err(e.into());
        }
    }

    ensure_indexes(&db).await?;
    Ok(db)
}

/// Unique keys the flows rely on for duplicate detection.
async fn ensure_indexes(db: &Database) -> Result<()> {
    let unique = IndexOptions::builder().unique(true).build();

    for role in [Role::Ngo, Role::Resort, Role::Admin] {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(unique.clone())
            .build();
        db.collection::<mongodb::bson::Document>(role.collection())
            .create_index(index)
            .await?;
    }

    let otp_index = IndexModel::builder()
        .keys(doc! { "contact": 1, "channel": 1 })
        .options(unique)
        .build();
    db.collection::<mongodb::bson::Document>("otps")
        .create_index(otp_index)
        .await?;

    let donation_index = IndexModel::builder()
        .keys(doc! { "status": 1, "created_at": -1 })
        .build();
    db.collection::<mongodb::bson::Document>("donations")
        .create_index(donation_index)
        .await?;

    tracing::info!("📂 Indexes ensured");
    Ok(())
}
