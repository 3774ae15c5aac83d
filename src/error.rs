use thiserror::Error;

use crate::{
    config::ConfigError, gateway::GatewayError, models::ValidationError,
    preferences::PreferencesError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Preferences error: {0}")]
    Preferences(#[from] PreferencesError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The text surfaced to the user for a failed operation.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Gateway(e) => e.to_string(),
            AppError::Validation(e) => e.message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
