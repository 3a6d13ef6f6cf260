//! PSP Delegation
//!
//! The payment-service-provider capability used by the handshake. Only a
//! mock provider ships here; a real integration implements the same trait.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use checkout_core::{PaymentAuthorization, SessionId};

use crate::error::{PaymentError, Result};
use crate::submission::CardDetails;

type HmacSha256 = Hmac<Sha256>;

/// Payment provider trait (Strategy pattern)
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Authorize `amount` minor units against the card for a session
    async fn authorize(
        &self,
        session_id: &SessionId,
        amount: i64,
        card: &CardDetails,
    ) -> Result<PaymentAuthorization>;

    /// Check that a stored receipt was issued by this provider for the session
    fn verify_receipt(&self, session_id: &SessionId, receipt: &PaymentAuthorization) -> bool;

    /// Provider name
    fn name(&self) -> &str;
}

/// Mock provider that authorizes every validated card
///
/// Receipts are HMAC-signed so a stored receipt can be checked before a
/// retried finalization reuses it.
pub struct MockPaymentProvider {
    secret: Vec<u8>,
    decline: bool,
}

impl MockPaymentProvider {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            decline: false,
        }
    }

    /// Provider that refuses every authorization
    pub fn declining(secret: impl AsRef<[u8]>) -> Self {
        Self {
            decline: true,
            ..Self::new(secret)
        }
    }

    fn sign(&self, session_id: &SessionId, authorization_id: &str, amount: i64) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| PaymentError::Config(format!("Invalid signing secret: {}", e)))?;
        mac.update(format!("{}:{}:{}", session_id, authorization_id, amount).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn authorize(
        &self,
        session_id: &SessionId,
        amount: i64,
        card: &CardDetails,
    ) -> Result<PaymentAuthorization> {
        if self.decline {
            return Err(PaymentError::DelegationFailed("Card declined by mock provider".into()));
        }

        let id = format!("auth_{}", Uuid::new_v4().simple());
        let signature = self.sign(session_id, &id, amount)?;

        tracing::info!(
            session_id = %session_id,
            authorization_id = %id,
            amount,
            last4 = %card.last4(),
            "Mock PSP authorized payment"
        );

        Ok(PaymentAuthorization {
            id,
            provider: self.name().to_string(),
            amount,
            signature,
            authorized_at: Utc::now(),
        })
    }

    fn verify_receipt(&self, session_id: &SessionId, receipt: &PaymentAuthorization) -> bool {
        let Ok(expected) = hex::decode(&receipt.signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(format!("{}:{}:{}", session_id, receipt.id, receipt.amount).as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn name(&self) -> &str {
        "mock-psp"
    }
}
