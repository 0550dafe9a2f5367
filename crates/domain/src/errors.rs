//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Syndica.
///
/// The variants mirror the component boundaries: `InvalidSchedule` is raised
/// while a post specification is being built, `Delivery` is a single
/// platform's failure after retries, `Dispatch` is a post-level failure
/// outside any one platform's scope.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SyndicaError {
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Syndica operations
pub type Result<T> = std::result::Result<T, SyndicaError>;
