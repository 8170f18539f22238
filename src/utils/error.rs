use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailerError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Directory returned no customers; aborting run")]
    EmptyDirectory,

    #[error("Dispatch failed: {message}")]
    DispatchError { message: String },

    #[error("Audit sink insert failed: {message}")]
    AuditSinkError { message: String },
}

pub type Result<T> = std::result::Result<T, MailerError>;
