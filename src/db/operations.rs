use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::db::models::Credential;
use crate::error::DatabaseError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, DatabaseError>;

    /// Fails with [`DatabaseError::Duplicate`] when the username is taken.
    async fn create(&self, credential: &Credential) -> Result<(), DatabaseError>;
}

pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        Self::new_with_options(&config.url, config.max_connections, Duration::from_secs(5)).await
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, DatabaseError> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(credential)
    }

    async fn create(&self, credential: &Credential) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES ($1, $2, $3)")
            .bind(&credential.username)
            .bind(&credential.password_hash)
            .bind(credential.created_at)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }
}
