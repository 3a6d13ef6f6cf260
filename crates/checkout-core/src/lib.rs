//! # checkout-core
//!
//! Checkout session contract, payment gate and host tool surface.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      checkout-core                            │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────┐  │
//! │  │    Gate     │──│ SessionStore│  │  Tool Registry       │  │
//! │  │ (read-only) │  │  (Strategy) │  │  + Host Messages     │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `SessionStore` trait lets the gate and the payment handshake run
//! against an in-memory store or a remote merchant service unchanged.

pub mod error;
pub mod events;
pub mod gate;
pub mod message;
pub mod session;
pub mod tool;

pub use error::{CheckoutError, Result};
pub use events::{CheckoutEvent, EventSender};
pub use gate::{Gate, GateDenial, GateResult};
pub use message::{CompletionSignal, HostMessage};
pub use session::{
    Address, CheckoutSession, ContactInfo, MemorySessionStore, OrderResult, PaymentAuthorization,
    SessionId, SessionStatus, SessionStore, TotalLine,
};
pub use tool::{ContentBlock, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema, UiResource};
