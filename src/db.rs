use sqlx::MySqlPool;
use sqlx::migrate::MigrateError;
use tracing::info;

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPool::connect(database_url).await
}

/// Applies the schema in `migrations/`, embedded at compile time.
pub async fn run_migrations(pool: &MySqlPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
