//! Domain error types
//!
//! These errors represent chat pipeline failures, distinct from the
//! transport-level errors raised by the model client.

use crate::llm::LlmError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a chat request
#[derive(Debug, Error)]
pub enum ChatError {
    /// The user's message was empty after trimming
    #[error("Message cannot be empty")]
    EmptyMessage,

    /// The request was cancelled or superseded by a newer one
    #[error("Request was cancelled")]
    Cancelled,

    /// The model did not answer within the allotted time
    #[error("Request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The model call failed
    #[error("Failed to get response from model: {0}")]
    Llm(#[from] LlmError),
}

impl ChatError {
    /// HTTP status code the error is reported with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::EmptyMessage => 400,
            // Non-standard "client closed request"
            Self::Cancelled => 499,
            Self::Timeout(_) | Self::Llm(_) => 500,
        }
    }

    /// Short error label for response bodies
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "Message cannot be empty",
            Self::Cancelled => "Request was cancelled",
            Self::Timeout(_) => "Request timed out",
            Self::Llm(_) => "Failed to get response from model",
        }
    }
}
