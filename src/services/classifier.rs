//! Turns a failed exchange into text that can sit in the conversation.

use crate::providers::ProviderError;

pub const SERVER_FAULT_TEXT: &str =
    "The server ran into an internal error.\nPlease check the RAG system.";
pub const TIMEOUT_TEXT: &str =
    "The request timed out.\nThe server is not responding.";
pub const UNCLASSIFIED_TEXT: &str =
    "Sorry, a temporary error occurred.\nPlease try again in a moment.";
pub const DISCLAIMER: &str =
    "This information cannot substitute for consulting a medical professional.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ServerFault,
    Timeout,
    Unclassified,
}

impl FailureKind {
    pub fn classify(err: &ProviderError) -> Self {
        match err {
            ProviderError::ServerFault { .. } => FailureKind::ServerFault,
            ProviderError::RequestFailed { status, .. } if *status >= 500 => {
                FailureKind::ServerFault
            }
            ProviderError::Timeout => FailureKind::Timeout,
            ProviderError::NetworkError(_)
            | ProviderError::RequestFailed { .. }
            | ProviderError::InvalidResponse(_) => FailureKind::Unclassified,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            FailureKind::ServerFault => SERVER_FAULT_TEXT,
            FailureKind::Timeout => TIMEOUT_TEXT,
            FailureKind::Unclassified => UNCLASSIFIED_TEXT,
        }
    }
}

/// Display text for a failed exchange, disclaimer included.
pub fn failure_message(err: &ProviderError) -> String {
    let kind = FailureKind::classify(err);
    tracing::warn!(kind = ?kind, error = %err, "Chat exchange failed");
    format!("{}\n\n⚠️ {}", kind.text(), DISCLAIMER)
}
