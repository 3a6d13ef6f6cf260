//! # merchant-checkout
//!
//! The merchant-facing half of checkout: the `collect_payment_details` tool,
//! the payment form it renders and the HTTP client for a merchant's
//! checkout session API.
//!
//! ## Payment step
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  host calls collect_payment_details                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Gate denies   ──▶  isError text ("Error: ...")             │
//! │  Gate allows   ──▶  ui://payment/{uuid} HTML form           │
//! │  form submits  ──▶  POST /payment/process (x-checkout-session)
//! │  Done clicked  ──▶  {"type":"tool","payload":{toolName}}    │
//! │  tool re-run   ──▶  "Payment complete. Order ord_..."       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod merchant;
pub mod surface;
pub mod svckit;

pub use merchant::HttpMerchantStore;
pub use surface::{format_minor_units, PaymentFormProducer, PAYMENT_ENDPOINT_PATH, SESSION_HEADER};
pub use svckit::COLLECT_PAYMENT_TOOL;

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::CollectPaymentDetailsTool;
}
