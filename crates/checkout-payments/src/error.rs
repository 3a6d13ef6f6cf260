//! Payment Error Types

use thiserror::Error;

use checkout_core::{CheckoutError, GateDenial};

use crate::submission::FieldErrors;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Submitted fields failed presence/length checks
    #[error("Invalid payment input: {0}")]
    InvalidInput(FieldErrors),

    /// Session is not in a state that allows payment
    #[error("Payment not allowed: {0}")]
    NotAllowed(GateDenial),

    /// PSP refused or failed the authorization
    #[error("PSP delegation failed: {0}")]
    DelegationFailed(String),

    /// PSP authorized but the session could not be finalized
    #[error("Finalization failed for session {session_id} after authorization {authorization_id}: {source}")]
    Finalization {
        session_id: String,
        authorization_id: String,
        #[source]
        source: CheckoutError,
    },

    /// Session store error before any delegation happened
    #[error(transparent)]
    Session(#[from] CheckoutError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::DelegationFailed(_) | PaymentError::Finalization { .. } => true,
            PaymentError::Session(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Distinct failure after a charge may have happened
    pub fn needs_operator_attention(&self) -> bool {
        matches!(self, PaymentError::Finalization { .. })
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::InvalidInput(_) => "Please correct the highlighted payment fields.".into(),
            PaymentError::NotAllowed(reason) => reason.user_message().into(),
            PaymentError::DelegationFailed(_) => "Payment processing failed. Please try again.".into(),
            PaymentError::Session(e) => e.user_message(),
            _ => "An error occurred processing your payment.".into(),
        }
    }
}
