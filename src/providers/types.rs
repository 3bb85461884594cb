use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Citation;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Server fault: HTTP {status}")]
    ServerFault { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request failed: HTTP {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::NetworkError(err.to_string())
        }
    }
}

/// What the remote service said about one question.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub sources: Vec<Citation>,
    pub processing_time: Option<Duration>,
    pub model_used: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrugCatalog {
    pub drugs: Vec<String>,
    pub total_count: Option<u64>,
    pub total_documents: Option<u64>,
    pub message: Option<String>,
}
