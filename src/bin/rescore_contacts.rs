//! Script to recompute the stored enrichment score of every contact.
//!
//! Run after changing field weights so persisted scores match the current
//! formula. Applies pending migrations first.

use better_contacts::data::db::Database;
use better_contacts::data::db_storage::ContactStorage;
use dotenvy::dotenv;
use std::env;

/// Main entry point for the rescore script.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let database_url = env::var("DATABASE_URL")
        .or_else(|_| env::var("DB_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let db = Database::new(&database_url).await?;

    tracing::info!("Connected to database. Recomputing enrichment scores...");

    let updated = ContactStorage::new(db.pool.clone())
        .rescore_all()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    tracing::info!("Rescore complete. Updated {} contact(s).", updated);

    Ok(())
}

