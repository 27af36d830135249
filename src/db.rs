use sqlx::MySqlPool;
use tracing::info;

use crate::store::Repositories;

pub const MEMORY_URL_PREFIX: &str = "memory:";

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPool::connect(database_url).await
}

/// Creates the two tables when missing. Records keep their typed body as
/// JSON text; only the envelope is broken out into columns.
pub async fn migrate(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id CHAR(36) NOT NULL PRIMARY KEY,
            username VARCHAR(64) NOT NULL UNIQUE,
            password_hash VARCHAR(255) NOT NULL,
            role VARCHAR(16) NOT NULL,
            full_name VARCHAR(255) NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            last_login_at DATETIME(3) NULL,
            created_at DATETIME(3) NOT NULL,
            INDEX idx_users_role (role)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id CHAR(36) NOT NULL PRIMARY KEY,
            record_type VARCHAR(32) NOT NULL,
            created_at DATETIME(3) NOT NULL,
            updated_at DATETIME(3) NOT NULL,
            created_by CHAR(36) NULL,
            body LONGTEXT NOT NULL,
            INDEX idx_records_type_created (record_type, created_at),
            INDEX idx_records_created (created_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Opens the configured backend. A `memory:` URL selects the in-process
/// store; anything else is handed to the MySQL driver.
pub async fn connect(database_url: &str) -> Result<Repositories, sqlx::Error> {
    if database_url.starts_with(MEMORY_URL_PREFIX) {
        info!("Using in-memory store, data is lost on restart");
        return Ok(Repositories::in_memory());
    }

    let pool = init_db(database_url).await?;
    migrate(&pool).await?;
    info!("Connected to MySQL");
    Ok(Repositories::mysql(pool))
}
