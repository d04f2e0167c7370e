//! Schema migrations for the history store.

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use tracing::{debug, info};

use filehub_core::error::{AppError, ErrorKind};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply every migration the store has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    let known = MIGRATOR.iter().count();
    debug!(known, "Applying history store migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("History store migration failed: {e}"),
            e,
        )
    })?;

    info!(known, "History store schema is current");
    Ok(())
}
