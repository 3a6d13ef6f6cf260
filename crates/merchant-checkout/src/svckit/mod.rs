//! Service Kit - Host Tools
//!
//! Tools that implement `checkout_core::Tool` for the merchant checkout.

mod collect_payment;

pub use collect_payment::{CollectPaymentDetailsTool, COLLECT_PAYMENT_TOOL};
