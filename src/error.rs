use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Quota exceeded for feature '{feature}' (limit {limit})")]
    QuotaExceeded { feature: String, limit: i64 },

    #[error("Feature '{0}' is disabled for this tier")]
    FeatureDisabled(String),

    #[error("Audit write failed: {0}")]
    AuditWriteError(String),

    #[error("Notification dispatch failed: {0}")]
    NotificationError(String),

    #[error("Data integrity fault: {0}")]
    IntegrityError(String),

    #[error("Data layer timeout: {0}")]
    TimeoutError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}
