//! Error Types

use thiserror::Error;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Session does not exist in the store
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Requested transition is not allowed from the current status
    #[error("Invalid transition for session {session_id}: {from} -> {to}")]
    InvalidTransition {
        session_id: String,
        from: String,
        to: String,
    },

    /// Finalization attempted with an amount that differs from the recorded one
    #[error("Finalization conflict for session {session_id}: recorded {recorded}, requested {requested}")]
    FinalizationConflict {
        session_id: String,
        recorded: i64,
        requested: i64,
    },

    /// Session store backend failed
    #[error("Store error: {0}")]
    Store(String),

    /// Session store backend unreachable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::StoreUnavailable(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::SessionNotFound(_) => {
                "No active checkout session. Please add items to your cart first.".into()
            }
            CheckoutError::InvalidTransition { .. } => {
                "This checkout can no longer be paid. Please start a new checkout.".into()
            }
            CheckoutError::StoreUnavailable(_) => {
                "The checkout service is currently unavailable. Please try again.".into()
            }
            CheckoutError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            CheckoutError::ToolValidation(msg) => format!("Invalid tool input: {}", msg),
            _ => "Payment processing failed. Please try again.".into(),
        }
    }
}
