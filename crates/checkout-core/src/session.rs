//! Checkout Sessions
//!
//! The session-state contract shared by the gate, the payment handshake and
//! every session store backend.
//!
//! A session moves forward only:
//!
//! ```text
//! ACTIVE ──record_payment──▶ PAYMENT_COLLECTED ──complete_session──▶ COMPLETED
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{CheckoutError, Result};

/// Totals line carrying the amount due
pub const TOTAL_LINE_TYPE: &str = "total";

/// Opaque checkout session identifier, supplied by the caller context
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Buyer contact details
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl ContactInfo {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    /// All three fields present
    pub fn is_complete(&self) -> bool {
        [&self.first_name, &self.last_name, &self.email]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// Shipping address
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl Address {
    pub fn is_complete(&self) -> bool {
        [&self.line1, &self.city, &self.postal_code, &self.country]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// One line of the totals breakdown (amount in minor currency units)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalLine {
    #[serde(rename = "type")]
    pub line_type: String,
    pub amount: i64,
}

impl TotalLine {
    pub fn new(line_type: impl Into<String>, amount: i64) -> Self {
        Self {
            line_type: line_type.into(),
            amount,
        }
    }
}

/// Session lifecycle tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    PaymentCollected,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::PaymentCollected => "PAYMENT_COLLECTED",
            SessionStatus::Completed => "COMPLETED",
        }
    }

    /// Open for payment collection
    pub fn is_open(&self) -> bool {
        !matches!(self, SessionStatus::Completed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receipt of a successful PSP delegation, stored before finalization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    /// Provider-issued authorization identifier
    pub id: String,

    /// Provider name
    pub provider: String,

    /// Authorized amount in minor units
    pub amount: i64,

    /// Provider signature over the receipt
    pub signature: String,

    pub authorized_at: DateTime<Utc>,
}

/// Snapshot produced when a session completes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub order_id: String,
    pub amount: i64,
}

impl OrderResult {
    fn mint(amount: i64) -> Self {
        Self {
            order_id: format!("ord_{}", Uuid::new_v4().simple()),
            amount,
        }
    }
}

/// A checkout session as owned by the session store
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub id: SessionId,

    #[serde(default)]
    pub contact_info: Option<ContactInfo>,

    #[serde(default)]
    pub shipping_address: Option<Address>,

    #[serde(default)]
    pub totals: Vec<TotalLine>,

    pub status: SessionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentAuthorization>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderResult>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Create an active session with no checkout details yet
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            contact_info: None,
            shipping_address: None,
            totals: Vec::new(),
            status: SessionStatus::Active,
            payment: None,
            order: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_contact_info(mut self, contact: ContactInfo) -> Self {
        self.contact_info = Some(contact);
        self
    }

    pub fn with_shipping_address(mut self, address: Address) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn with_totals(mut self, totals: Vec<TotalLine>) -> Self {
        self.totals = totals;
        self
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn has_complete_contact_info(&self) -> bool {
        self.contact_info.as_ref().is_some_and(ContactInfo::is_complete)
    }

    pub fn has_shipping_address(&self) -> bool {
        self.shipping_address.as_ref().is_some_and(Address::is_complete)
    }

    /// Amount of the `total` line, if any
    pub fn total_amount(&self) -> Option<i64> {
        self.totals
            .iter()
            .find(|line| line.line_type == TOTAL_LINE_TYPE)
            .map(|line| line.amount)
    }

    /// Apply ACTIVE -> PAYMENT_COLLECTED
    pub fn record_payment(&mut self, authorization: PaymentAuthorization) -> Result<()> {
        match self.status {
            SessionStatus::Active => {
                if !self.has_complete_contact_info() || !self.has_shipping_address() {
                    return Err(self.invalid_transition(SessionStatus::PaymentCollected));
                }
                let total = self.total_amount().unwrap_or(0);
                if authorization.amount != total {
                    return Err(CheckoutError::FinalizationConflict {
                        session_id: self.id.to_string(),
                        recorded: total,
                        requested: authorization.amount,
                    });
                }
                self.payment = Some(authorization);
                self.status = SessionStatus::PaymentCollected;
                self.touch();
                Ok(())
            }
            SessionStatus::PaymentCollected | SessionStatus::Completed => match &self.payment {
                Some(existing) if existing.id == authorization.id => Ok(()),
                Some(existing) => Err(CheckoutError::FinalizationConflict {
                    session_id: self.id.to_string(),
                    recorded: existing.amount,
                    requested: authorization.amount,
                }),
                None => Err(self.invalid_transition(SessionStatus::PaymentCollected)),
            },
        }
    }

    /// Apply PAYMENT_COLLECTED -> COMPLETED; returns the existing order when already completed
    pub fn complete(&mut self) -> Result<OrderResult> {
        match self.status {
            SessionStatus::Completed => self
                .order
                .clone()
                .ok_or_else(|| CheckoutError::Store(format!("session {} completed without order", self.id))),
            SessionStatus::PaymentCollected => {
                let total = self.total_amount().unwrap_or(0);
                let authorized = self.payment.as_ref().map_or(total, |p| p.amount);
                if authorized != total {
                    return Err(CheckoutError::FinalizationConflict {
                        session_id: self.id.to_string(),
                        recorded: authorized,
                        requested: total,
                    });
                }
                let order = OrderResult::mint(total);
                self.order = Some(order.clone());
                self.status = SessionStatus::Completed;
                self.touch();
                Ok(order)
            }
            SessionStatus::Active => Err(self.invalid_transition(SessionStatus::Completed)),
        }
    }

    fn invalid_transition(&self, to: SessionStatus) -> CheckoutError {
        CheckoutError::InvalidTransition {
            session_id: self.id.to_string(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

/// Session store consumed by the gate and the payment handshake
///
/// The store exclusively owns session mutation; callers request transitions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session regardless of status
    async fn get_session(&self, id: &SessionId) -> Result<Option<CheckoutSession>>;

    /// Record a PSP authorization (ACTIVE -> PAYMENT_COLLECTED)
    async fn record_payment(&self, id: &SessionId, authorization: PaymentAuthorization) -> Result<()>;

    /// Finalize the session (PAYMENT_COLLECTED -> COMPLETED), idempotent
    async fn complete_session(&self, id: &SessionId) -> Result<OrderResult>;

    /// Load a session that is still open for payment
    async fn get_active_session(&self, id: &SessionId) -> Result<Option<CheckoutSession>> {
        Ok(self
            .get_session(id)
            .await?
            .filter(|session| session.status.is_open()))
    }

    async fn has_active_session(&self, id: &SessionId) -> Result<bool> {
        Ok(self.get_active_session(id).await?.is_some())
    }

    async fn has_complete_contact_info(&self, id: &SessionId) -> Result<bool> {
        Ok(self
            .get_active_session(id)
            .await?
            .is_some_and(|session| session.has_complete_contact_info()))
    }

    async fn has_shipping_address(&self, id: &SessionId) -> Result<bool> {
        Ok(self
            .get_active_session(id)
            .await?
            .is_some_and(|session| session.has_shipping_address()))
    }
}

/// In-memory session store (for development/testing)
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, CheckoutSession>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a session
    pub fn insert(&self, session: CheckoutSession) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update<T>(
        &self,
        id: &SessionId,
        apply: impl FnOnce(&mut CheckoutSession) -> Result<T>,
    ) -> Result<T> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| CheckoutError::SessionNotFound(id.to_string()))?;
        apply(session)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> CheckoutError {
    CheckoutError::Store("session map lock poisoned".into())
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_session(&self, id: &SessionId) -> Result<Option<CheckoutSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    async fn record_payment(&self, id: &SessionId, authorization: PaymentAuthorization) -> Result<()> {
        self.update(id, |session| session.record_payment(authorization))
    }

    async fn complete_session(&self, id: &SessionId) -> Result<OrderResult> {
        let order = self.update(id, CheckoutSession::complete)?;
        tracing::info!(session_id = %id, order_id = %order.order_id, "Session completed");
        Ok(order)
    }
}
