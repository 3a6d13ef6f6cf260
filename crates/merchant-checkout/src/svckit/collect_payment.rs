//! Collect Payment Details Tool
//!
//! Zero-argument tool the host calls when the buyer is ready to pay. It
//! runs the gate and either explains the missing step or returns the
//! payment form. The form's completion signal invokes the tool again, which
//! then reports the placed order so the conversation can continue.

use std::sync::Arc;

use async_trait::async_trait;

use checkout_core::{
    CheckoutEvent, CompletionSignal, EventSender, Gate, GateDenial, GateResult, Result as CoreResult,
    SessionStatus, SessionStore, Tool, ToolCall, ToolResult, ToolSchema,
};
use checkout_payments::ExpiryWindow;

use crate::surface::{format_minor_units, PaymentFormProducer};

/// Registered tool name
pub const COLLECT_PAYMENT_TOOL: &str = "collect_payment_details";

/// Tool that gates and renders the payment form
pub struct CollectPaymentDetailsTool {
    store: Arc<dyn SessionStore>,
    gate: Gate,
    producer: PaymentFormProducer,
    endpoint: String,
    events: Option<EventSender>,
}

impl CollectPaymentDetailsTool {
    /// `endpoint` is the handshake URL baked into the form
    pub fn new(store: Arc<dyn SessionStore>, endpoint: impl Into<String>, window: ExpiryWindow) -> Self {
        Self {
            gate: Gate::new(store.clone()),
            store,
            producer: PaymentFormProducer::new(window, CompletionSignal::for_tool(COLLECT_PAYMENT_TOOL)),
            endpoint: endpoint.into(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }
}

#[async_trait]
impl Tool for CollectPaymentDetailsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: COLLECT_PAYMENT_TOOL.into(),
            title: "Collect Payment Details".into(),
            description: "Collects payment information from the user. Do NOT describe the content of the form. You stop sending messages after this tool call.".into(),
            parameters: vec![],
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let Some(session_id) = call.session_id.as_ref() else {
            return Ok(ToolResult::error(
                COLLECT_PAYMENT_TOOL,
                GateDenial::NoActiveSession.user_message(),
            ));
        };

        let placed_order = self
            .store
            .get_session(session_id)
            .await?
            .filter(|session| session.status == SessionStatus::Completed)
            .and_then(|session| session.order);
        if let Some(order) = placed_order {
            tracing::info!(session_id = %session_id, order_id = %order.order_id, "Payment step concluded");
            return Ok(ToolResult::text(
                COLLECT_PAYMENT_TOOL,
                format!(
                    "Payment complete. Order {} for {} has been placed.",
                    order.order_id,
                    format_minor_units(order.amount)
                ),
            ));
        }

        match self.gate.can_collect_payment(session_id).await? {
            GateResult::Denied(reason) => {
                Ok(ToolResult::error(COLLECT_PAYMENT_TOOL, reason.user_message()))
            }
            GateResult::Allowed { session, total_amount } => {
                let surface = self.producer.build_surface(&session, total_amount, &self.endpoint)?;

                tracing::info!(
                    session_id = %session_id,
                    total_amount,
                    uri = %surface.uri,
                    "Rendered payment surface"
                );
                if let Some(events) = &self.events {
                    events.emit(CheckoutEvent::PaymentSurfaceRendered {
                        session_id: session_id.clone(),
                        total_amount,
                    });
                }

                Ok(ToolResult::resource(COLLECT_PAYMENT_TOOL, surface))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{
        Address, CheckoutSession, ContactInfo, MemorySessionStore, PaymentAuthorization, SessionId,
        TotalLine,
    };

    fn address() -> Address {
        Address {
            line1: "1 Main St".into(),
            city: "Springfield".into(),
            postal_code: "12345".into(),
            country: "US".into(),
            ..Default::default()
        }
    }

    fn tool_with(store: Arc<MemorySessionStore>) -> CollectPaymentDetailsTool {
        CollectPaymentDetailsTool::new(store, "http://localhost:3112/payment/process", ExpiryWindow::new(2025, 6))
    }

    #[tokio::test]
    async fn test_renders_surface_for_ready_session() {
        let store = Arc::new(MemorySessionStore::new());
        store
            .insert(
                CheckoutSession::new(SessionId::from_string("s1"))
                    .with_contact_info(ContactInfo::new("A", "B", "a@b.com"))
                    .with_shipping_address(address())
                    .with_totals(vec![TotalLine::new("total", 2500)]),
            )
            .unwrap();
        let (events, mut rx) = EventSender::channel(4);
        let tool = tool_with(store).with_events(events);

        let call = ToolCall::new(COLLECT_PAYMENT_TOOL).for_session(SessionId::from_string("s1"));
        let result = tool.execute(&call).await.unwrap();

        assert!(!result.is_error);
        let surface = result.first_resource().unwrap();
        assert!(surface.text.contains("$25.00"));
        assert!(matches!(
            rx.recv().await,
            Some(CheckoutEvent::PaymentSurfaceRendered { total_amount: 2500, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_shipping_never_renders() {
        let store = Arc::new(MemorySessionStore::new());
        store
            .insert(
                CheckoutSession::new(SessionId::from_string("s1"))
                    .with_contact_info(ContactInfo::new("A", "B", "a@b.com")),
            )
            .unwrap();
        let tool = tool_with(store);

        let call = ToolCall::new(COLLECT_PAYMENT_TOOL).for_session(SessionId::from_string("s1"));
        let result = tool.execute(&call).await.unwrap();

        assert!(result.is_error);
        assert!(result.first_resource().is_none());
        assert_eq!(
            result.first_text(),
            Some(GateDenial::IncompleteShippingAddress.user_message())
        );
    }

    #[tokio::test]
    async fn test_no_session_context() {
        let tool = tool_with(Arc::new(MemorySessionStore::new()));
        let result = tool.execute(&ToolCall::new(COLLECT_PAYMENT_TOOL)).await.unwrap();
        assert!(result.is_error);
        assert_eq!(result.first_text(), Some(GateDenial::NoActiveSession.user_message()));
    }

    #[tokio::test]
    async fn test_completed_session_reports_order() {
        let store = Arc::new(MemorySessionStore::new());
        let id = SessionId::from_string("s1");
        store
            .insert(
                CheckoutSession::new(id.clone())
                    .with_contact_info(ContactInfo::new("A", "B", "a@b.com"))
                    .with_shipping_address(address())
                    .with_totals(vec![TotalLine::new("total", 4999)]),
            )
            .unwrap();
        store
            .record_payment(
                &id,
                PaymentAuthorization {
                    id: "auth_1".into(),
                    provider: "test".into(),
                    amount: 4999,
                    signature: String::new(),
                    authorized_at: chrono::Utc::now(),
                },
            )
            .await
            .unwrap();
        let order = store.complete_session(&id).await.unwrap();
        let tool = tool_with(store);

        let result = tool
            .execute(&ToolCall::new(COLLECT_PAYMENT_TOOL).for_session(id))
            .await
            .unwrap();
        assert!(!result.is_error);
        let text = result.first_text().unwrap();
        assert!(text.contains(&order.order_id));
        assert!(text.contains("$49.99"));
    }
}
