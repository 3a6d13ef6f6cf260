//! Payment Gate
//!
//! Decides whether payment collection may start for a session. Checks run in
//! a fixed order and stop at the first failure, so the buyer is always
//! pointed at the earliest missing checkout step.

use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::session::{CheckoutSession, SessionId, SessionStore};

/// Why payment collection was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDenial {
    NoActiveSession,
    IncompleteContactInfo,
    IncompleteShippingAddress,
}

impl GateDenial {
    pub fn code(&self) -> &'static str {
        match self {
            GateDenial::NoActiveSession => "NO_ACTIVE_SESSION",
            GateDenial::IncompleteContactInfo => "INCOMPLETE_CONTACT_INFO",
            GateDenial::IncompleteShippingAddress => "INCOMPLETE_SHIPPING_ADDRESS",
        }
    }

    /// Guidance shown to the buyer
    pub fn user_message(&self) -> &'static str {
        match self {
            GateDenial::NoActiveSession => {
                "Error: No active checkout session. Please add items to your cart first."
            }
            GateDenial::IncompleteContactInfo => {
                "Error: Please provide your contact information (first name, last name, and email) first."
            }
            GateDenial::IncompleteShippingAddress => {
                "Error: Please provide your shipping address first."
            }
        }
    }
}

impl std::fmt::Display for GateDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of a gate check
#[derive(Clone, Debug)]
pub enum GateResult {
    Allowed {
        session: CheckoutSession,
        total_amount: i64,
    },
    Denied(GateDenial),
}

impl GateResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateResult::Allowed { .. })
    }

    pub fn denial(&self) -> Option<GateDenial> {
        match self {
            GateResult::Denied(reason) => Some(*reason),
            GateResult::Allowed { .. } => None,
        }
    }
}

/// Read-only gate over a session store
#[derive(Clone)]
pub struct Gate {
    store: Arc<dyn SessionStore>,
}

impl Gate {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Check the three payment preconditions in order
    ///
    /// Store failures are returned as `Err`, never as a denial.
    pub async fn can_collect_payment(&self, id: &SessionId) -> Result<GateResult> {
        if !self.store.has_active_session(id).await? {
            return Ok(self.deny(id, GateDenial::NoActiveSession));
        }

        if !self.store.has_complete_contact_info(id).await? {
            return Ok(self.deny(id, GateDenial::IncompleteContactInfo));
        }

        if !self.store.has_shipping_address(id).await? {
            return Ok(self.deny(id, GateDenial::IncompleteShippingAddress));
        }

        // The session may have closed between the checks above
        let Some(session) = self.store.get_active_session(id).await? else {
            return Ok(self.deny(id, GateDenial::NoActiveSession));
        };

        let total_amount = session.total_amount().unwrap_or_else(|| {
            tracing::warn!(session_id = %id, "Session has no total line, using 0");
            0
        });

        tracing::debug!(session_id = %id, total_amount, "Payment collection allowed");
        Ok(GateResult::Allowed {
            session,
            total_amount,
        })
    }

    fn deny(&self, id: &SessionId, reason: GateDenial) -> GateResult {
        tracing::info!(session_id = %id, reason = %reason, "Payment collection denied");
        GateResult::Denied(reason)
    }
}
