//! Database migration command.

use crate::output;
use filehub_core::config::AppConfig;
use filehub_core::error::AppError;
use filehub_database::DatabasePool;

/// Run all pending migrations
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    println!("Running database migrations...");
    let pool = DatabasePool::connect(&config.database).await?;
    filehub_database::migration::run_migrations(pool.pool()).await?;
    pool.close().await;
    output::print_success("All migrations applied successfully.");
    Ok(())
}
