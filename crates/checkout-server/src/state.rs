//! Application State

use std::sync::Arc;

use checkout_core::ToolRegistry;
use checkout_payments::PaymentHandshake;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Tool registry exposed to the host
    pub tools: Arc<ToolRegistry>,

    /// Payment submission handshake
    pub handshake: Arc<PaymentHandshake>,

    /// "memory" or "merchant", reported by /health
    pub store_kind: &'static str,
}
