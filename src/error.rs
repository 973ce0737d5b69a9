use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Upstream error: {0}")]
    ProxyError(#[from] ProxyError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(DatabaseError::from(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl AppError {
    /// Message safe to hand to a client. Anything that maps to a 5xx is
    /// collapsed into a fixed string; the details only go to the log.
    fn public_message(&self) -> String {
        match self {
            AppError::AuthError(AuthError::RateLimited { .. }) => "Too many requests".to_string(),
            AppError::AuthError(_) => "Unauthorized".to_string(),
            AppError::DatabaseError(DatabaseError::Duplicate) => "Resource already exists".to_string(),
            AppError::DatabaseError(DatabaseError::NotFound) => "Resource not found".to_string(),
            AppError::ProxyError(ProxyError::RateLimited) => "Too many requests".to_string(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let response = json!({
            "error": {
                "status": status.as_u16(),
                "message": self.public_message()
            }
        });

        let mut builder = HttpResponse::build(status);
        if let AppError::AuthError(AuthError::RateLimited { retry_after_secs }) = self {
            builder.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        builder.json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
                AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::ProxyError(ProxyError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => DatabaseError::Duplicate,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

/// Failures of the shared key-value store backing counters and cache entries.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("Upstream request failed: {0}")]
    RequestFailed(String),

    #[error("Upstream rate limited")]
    RateLimited,

    #[error("Upstream request timed out after {0}ms")]
    Timeout(u64),
}
