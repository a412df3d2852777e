//! Failures of a webhook exchange.
//!
//! Every variant is terminal for the call that produced it. Transient poll
//! failures never appear here; they are logged and counted against the
//! attempt budget instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook URL is empty")]
    InvalidUrl,

    #[error("Webhook HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    #[error("Webhook request failed: {0}")]
    Network(String),

    #[error("Webhook returned a response that is not JSON: {0}")]
    MalformedResponse(String),

    #[error("Timeout waiting for webhook response after {attempts} poll attempts")]
    Timeout { attempts: u32 },

    #[error("Webhook polling cancelled after {attempts} poll attempts")]
    Cancelled { attempts: u32 },
}

impl WebhookError {
    /// Short machine-readable code, attached to log events.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidUrl => "invalid_url",
            WebhookError::Http { .. } => "http_error",
            WebhookError::Network(_) => "network_error",
            WebhookError::MalformedResponse(_) => "malformed_response",
            WebhookError::Timeout { .. } => "timeout",
            WebhookError::Cancelled { .. } => "cancelled",
        }
    }
}
