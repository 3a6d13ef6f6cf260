//! # checkout-payments
//!
//! Payment submission handshake for checkout sessions.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌─────────────┐     ┌──────────────┐
//! │ Payment form│────▶│ PaymentHandshake │────▶│ PaymentProv.│     │ SessionStore │
//! │  (submit)   │     │  validate + gate │     │ (mock PSP)  │     │ record/complete
//! └─────────────┘     └──────────────────┘     └─────────────┘     └──────────────┘
//! ```
//!
//! The PSP sits behind [`PaymentProvider`]; the shipped [`MockPaymentProvider`]
//! authorizes every validated card. A real provider replaces it without
//! touching the gate or session finalization.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_payments::{MockPaymentProvider, PaymentHandshake, PaymentSubmission};
//!
//! let handshake = PaymentHandshake::new(store, Arc::new(MockPaymentProvider::new(secret)));
//! let order = handshake.process(&session_id, &submission).await?;
//! ```

mod error;
mod handshake;
mod psp;
mod submission;

pub use error::{PaymentError, Result};
pub use handshake::{HandshakeStage, PaymentHandshake};
pub use psp::{MockPaymentProvider, PaymentProvider};
pub use submission::{
    mask_card_number, CardDetails, ExpiryWindow, Field, FieldErrors, PaymentSubmission,
    MIN_CARD_NUMBER_LEN, MIN_CVC_LEN,
};
