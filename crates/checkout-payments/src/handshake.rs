//! Payment Handshake
//!
//! Server side of the payment form: validate the submission, delegate to the
//! PSP, record the receipt and finalize the session through the store.
//!
//! ```text
//! Received ─▶ Validated ─▶ PspDelegated ─▶ SessionFinalized ─▶ Responded
//!    └──────▶ RejectedInvalidInput
//! ```
//!
//! Finalization is serialized per session, so duplicate submissions collapse
//! into one completion and later ones get the stored order back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use checkout_core::{
    CheckoutError, CheckoutEvent, EventSender, Gate, GateDenial, GateResult, OrderResult,
    PaymentAuthorization, SessionId, SessionStatus, SessionStore,
};

use crate::error::{PaymentError, Result};
use crate::psp::PaymentProvider;
use crate::submission::{ExpiryWindow, PaymentSubmission};

/// Per-request handshake stage, logged as the request advances
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeStage {
    Received,
    Validated,
    RejectedInvalidInput,
    PspDelegated,
    SessionFinalized,
    Responded,
}

impl HandshakeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeStage::Received => "RECEIVED",
            HandshakeStage::Validated => "VALIDATED",
            HandshakeStage::RejectedInvalidInput => "REJECTED_INVALID_INPUT",
            HandshakeStage::PspDelegated => "PSP_DELEGATED",
            HandshakeStage::SessionFinalized => "SESSION_FINALIZED",
            HandshakeStage::Responded => "RESPONDED",
        }
    }
}

impl std::fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type SessionLock = Arc<tokio::sync::Mutex<()>>;

/// Payment handshake over an injected store and PSP
pub struct PaymentHandshake {
    store: Arc<dyn SessionStore>,
    gate: Gate,
    provider: Arc<dyn PaymentProvider>,
    window: ExpiryWindow,
    events: Option<EventSender>,
    locks: Mutex<HashMap<SessionId, SessionLock>>,
}

impl PaymentHandshake {
    pub fn new(store: Arc<dyn SessionStore>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            gate: Gate::new(store.clone()),
            store,
            provider,
            window: ExpiryWindow::current(),
            events: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_expiry_window(mut self, window: ExpiryWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the handshake for one submission
    pub async fn process(
        &self,
        session_id: &SessionId,
        submission: &PaymentSubmission,
    ) -> Result<OrderResult> {
        trace_stage(session_id, HandshakeStage::Received);

        let card = submission.validate(&self.window).map_err(|errors| {
            tracing::info!(
                session_id = %session_id,
                stage = %HandshakeStage::RejectedInvalidInput,
                %errors,
                "Payment submission rejected"
            );
            PaymentError::InvalidInput(errors)
        })?;
        trace_stage(session_id, HandshakeStage::Validated);

        let lock = self.session_lock(session_id)?;
        let order = {
            let _guard = lock.lock().await;
            self.finalize_locked(session_id, &card).await
        };
        self.release_lock(session_id, lock);

        if order.is_ok() {
            trace_stage(session_id, HandshakeStage::Responded);
        }
        order
    }

    async fn finalize_locked(
        &self,
        session_id: &SessionId,
        card: &crate::submission::CardDetails,
    ) -> Result<OrderResult> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or(PaymentError::NotAllowed(GateDenial::NoActiveSession))?;

        let receipt = match session.status {
            SessionStatus::Completed => {
                let order = match session.order {
                    Some(order) => order,
                    None => self.store.complete_session(session_id).await?,
                };
                tracing::info!(
                    session_id = %session_id,
                    order_id = %order.order_id,
                    "Duplicate submission for completed session"
                );
                return Ok(order);
            }
            SessionStatus::PaymentCollected => {
                // A previous request delegated but did not finalize; reuse its receipt
                let Some(receipt) = session.payment else {
                    return Err(self.finalization_failed(
                        session_id,
                        None,
                        CheckoutError::Store("payment collected without a stored receipt".into()),
                    ));
                };
                if !self.provider.verify_receipt(session_id, &receipt) {
                    tracing::error!(
                        session_id = %session_id,
                        authorization_id = %receipt.id,
                        "Stored payment receipt failed verification"
                    );
                    return Err(PaymentError::DelegationFailed(
                        "Stored payment receipt could not be verified".into(),
                    ));
                }
                receipt
            }
            SessionStatus::Active => self.delegate(session_id, card).await?,
        };

        match self.store.complete_session(session_id).await {
            Ok(order) => {
                tracing::info!(
                    session_id = %session_id,
                    stage = %HandshakeStage::SessionFinalized,
                    order_id = %order.order_id,
                    amount = order.amount,
                    "Checkout session finalized"
                );
                self.emit(CheckoutEvent::PaymentCompleted {
                    session_id: session_id.clone(),
                    order: order.clone(),
                });
                Ok(order)
            }
            Err(source) => Err(self.finalization_failed(session_id, Some(&receipt), source)),
        }
    }

    /// Gate check, PSP authorization and receipt recording
    async fn delegate(
        &self,
        session_id: &SessionId,
        card: &crate::submission::CardDetails,
    ) -> Result<PaymentAuthorization> {
        let total_amount = match self.gate.can_collect_payment(session_id).await? {
            GateResult::Allowed { total_amount, .. } => total_amount,
            GateResult::Denied(reason) => return Err(PaymentError::NotAllowed(reason)),
        };

        let receipt = self
            .provider
            .authorize(session_id, total_amount, card)
            .await
            .inspect_err(|e| {
                tracing::warn!(session_id = %session_id, error = %e, "PSP delegation failed");
            })?;

        tracing::info!(
            session_id = %session_id,
            stage = %HandshakeStage::PspDelegated,
            authorization_id = %receipt.id,
            provider = self.provider.name(),
            "Payment authorized"
        );
        self.emit(CheckoutEvent::PaymentAuthorized {
            session_id: session_id.clone(),
            authorization_id: receipt.id.clone(),
            amount: receipt.amount,
        });

        if let Err(source) = self.store.record_payment(session_id, receipt.clone()).await {
            return Err(self.finalization_failed(session_id, Some(&receipt), source));
        }

        Ok(receipt)
    }

    fn finalization_failed(
        &self,
        session_id: &SessionId,
        receipt: Option<&PaymentAuthorization>,
        source: CheckoutError,
    ) -> PaymentError {
        let authorization_id = receipt.map(|r| r.id.clone()).unwrap_or_default();
        // Money may have moved without an order; this must reach an operator
        tracing::error!(
            session_id = %session_id,
            authorization_id = %authorization_id,
            error = %source,
            "Payment authorized but session finalization failed"
        );
        PaymentError::Finalization {
            session_id: session_id.to_string(),
            authorization_id,
            source,
        }
    }

    fn session_lock(&self, session_id: &SessionId) -> Result<SessionLock> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| PaymentError::Config("handshake lock table poisoned".into()))?;
        Ok(locks.entry(session_id.clone()).or_default().clone())
    }

    /// Drop the table entry once no other request holds or awaits it
    fn release_lock(&self, session_id: &SessionId, lock: SessionLock) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        let idle = locks
            .get(session_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(entry) == 2);
        if idle {
            locks.remove(session_id);
        }
    }

    fn emit(&self, event: CheckoutEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

fn trace_stage(session_id: &SessionId, stage: HandshakeStage) {
    tracing::debug!(session_id = %session_id, stage = %stage, "Payment handshake");
}
