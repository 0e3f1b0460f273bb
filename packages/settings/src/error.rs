use http::StatusCode;
use tally_fetch::FetchError;

use crate::path::SettingsPath;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// No settings row exists for the user yet.
    #[error("settings not found for user {user_id}")]
    NotFound { user_id: String },

    #[error("setting not found at path '{path}'")]
    PathNotFound { path: SettingsPath },

    #[error("invalid settings path: {message}")]
    InvalidPath { message: String },

    #[error("invalid settings document: {message}")]
    InvalidDocument { message: String },

    /// The backing data store reported a failure.
    #[error("store error: {0}")]
    Store(String),
}

impl SettingsError {
    /// Status the route layer replies with for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            SettingsError::NotFound { .. } | SettingsError::PathNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            SettingsError::InvalidPath { .. } | SettingsError::InvalidDocument { .. } => {
                StatusCode::BAD_REQUEST
            }
            SettingsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FetchError> for SettingsError {
    fn from(error: FetchError) -> Self {
        SettingsError::Store(error.to_string())
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(error: serde_json::Error) -> Self {
        SettingsError::Store(format!("malformed row: {}", error))
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;
