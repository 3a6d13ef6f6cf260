//! Merchant Integration
//!
//! `SessionStore` implementations backed by a merchant's checkout service.

mod http;

pub use http::HttpMerchantStore;
