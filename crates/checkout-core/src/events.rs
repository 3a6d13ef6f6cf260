//! Checkout Events
//!
//! Best-effort notifications emitted as sessions move through checkout.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::session::{OrderResult, SessionId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CheckoutEvent {
    PaymentSurfaceRendered {
        session_id: SessionId,
        total_amount: i64,
    },
    PaymentAuthorized {
        session_id: SessionId,
        authorization_id: String,
        amount: i64,
    },
    PaymentCompleted {
        session_id: SessionId,
        order: OrderResult,
    },
}

/// Fire-and-forget event sender
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<CheckoutEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<CheckoutEvent>) -> Self {
        Self { tx }
    }

    /// Create a sender together with its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CheckoutEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Emit without waiting; dropped if the channel is full or closed
    pub fn emit(&self, event: CheckoutEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!(error = %e, "Dropped checkout event");
        }
    }
}
