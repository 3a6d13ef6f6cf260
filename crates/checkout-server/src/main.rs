//! checkout-server
//!
//! Axum server for the checkout payment step: the host tool surface and the
//! payment handshake endpoint the rendered form posts to.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::{
    Address, CheckoutEvent, CheckoutSession, ContactInfo, EventSender, MemorySessionStore,
    SessionId, SessionStore, TotalLine, ToolRegistry,
};
use checkout_payments::{ExpiryWindow, MockPaymentProvider, PaymentHandshake};
use merchant_checkout::{tools::CollectPaymentDetailsTool, HttpMerchantStore, PAYMENT_ENDPOINT_PATH};

use crate::config::ServerConfig;
use crate::handlers::{health_check, invoke_tool, list_tools, process_payment};
use crate::state::AppState;

const EVENT_BUFFER: usize = 256;

/// Build the router over prepared state
pub fn build_router(state: AppState) -> Router {
    // The form is served inside a host iframe on another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))

        // Host tool surface
        .route("/api/tools", get(list_tools))
        .route("/api/tools/{name}", post(invoke_tool))

        // Payment handshake
        .route(PAYMENT_ENDPOINT_PATH, post(process_payment))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    // Session store
    let (store, store_kind): (Arc<dyn SessionStore>, &'static str) = match &config.merchant_api_url {
        Some(url) => {
            tracing::info!("✓ Using merchant API at {}", url);
            let merchant: Arc<dyn SessionStore> = Arc::new(HttpMerchantStore::new(url.as_str())?);
            (merchant, "merchant")
        }
        None => {
            tracing::warn!("⚠ MERCHANT_API_URL not set - sessions are kept in memory");
            let memory = MemorySessionStore::new();
            if let Some(id) = &config.demo_session_id {
                memory.insert(demo_session(id))?;
                tracing::info!("  Seeded demo session {}", id);
            }
            let memory: Arc<dyn SessionStore> = Arc::new(memory);
            (memory, "memory")
        }
    };

    // Checkout events are logged in the background
    let (events, mut rx) = EventSender::channel(EVENT_BUFFER);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_event(&event);
        }
    });

    let window = ExpiryWindow::current();
    let provider = Arc::new(MockPaymentProvider::new(&config.psp_signing_secret));
    let handshake = PaymentHandshake::new(store.clone(), provider)
        .with_expiry_window(window)
        .with_events(events.clone());

    // Initialize tools
    let mut tools = ToolRegistry::new();
    tools.register(
        CollectPaymentDetailsTool::new(store, config.payment_endpoint(), window).with_events(events),
    );

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let state = AppState {
        tools: Arc::new(tools),
        handshake: Arc::new(handshake),
        store_kind,
    };
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 checkout-server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health            - Health check");
    tracing::info!("  GET  /api/tools         - List tools");
    tracing::info!("  POST /api/tools/{{name}}  - Invoke a tool");
    tracing::info!("  POST /payment/process   - Payment handshake");
    tracing::info!("");
    tracing::info!("Payment form posts to {}", config.payment_endpoint());

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_event(event: &CheckoutEvent) {
    match event {
        CheckoutEvent::PaymentSurfaceRendered { session_id, total_amount } => {
            tracing::info!(session_id = %session_id, total_amount, "event: payment surface rendered");
        }
        CheckoutEvent::PaymentAuthorized { session_id, authorization_id, amount } => {
            tracing::info!(session_id = %session_id, authorization_id = %authorization_id, amount, "event: payment authorized");
        }
        CheckoutEvent::PaymentCompleted { session_id, order } => {
            tracing::info!(session_id = %session_id, order_id = %order.order_id, amount = order.amount, "event: payment completed");
        }
    }
}

/// A session that already passes the gate, for local testing
fn demo_session(id: &str) -> CheckoutSession {
    CheckoutSession::new(SessionId::from_string(id))
        .with_contact_info(ContactInfo::new("Test", "User", "test@example.com"))
        .with_shipping_address(Address {
            line1: "1 Market St".into(),
            city: "San Francisco".into(),
            state: Some("CA".into()),
            postal_code: "94105".into(),
            country: "US".into(),
            ..Default::default()
        })
        .with_totals(vec![
            TotalLine::new("subtotal", 4500),
            TotalLine::new("tax", 499),
            TotalLine::new("total", 4999),
        ])
}
