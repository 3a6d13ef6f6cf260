//! HTTP Merchant Store
//!
//! Talks to a merchant checkout API:
//!
//! ```text
//! GET  {base}/checkout_sessions/{id}           -> CheckoutSession | 404
//! POST {base}/checkout_sessions/{id}/payment   <- PaymentAuthorization
//! POST {base}/checkout_sessions/{id}/complete  -> OrderResult
//! ```
//!
//! Session ids are pushed as single percent-encoded path segments.
//! 404 means the session does not exist and 409 means the merchant refused
//! the transition. Transport failures and 5xx are reported as
//! `StoreUnavailable` so callers can retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;

use checkout_core::{
    CheckoutError, CheckoutSession, OrderResult, PaymentAuthorization, Result, SessionId,
    SessionStatus, SessionStore,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body returned by the merchant alongside a 409
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConflictBody {
    #[serde(default)]
    status: Option<SessionStatus>,
    #[serde(default)]
    recorded_amount: Option<i64>,
}

/// Session store backed by the merchant's checkout API
#[derive(Clone, Debug)]
pub struct HttpMerchantStore {
    client: Client,
    base_url: Url,
}

impl HttpMerchantStore {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| CheckoutError::Config(format!("merchant API URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CheckoutError::Config(format!("merchant API URL: {} cannot be a base", base_url)));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CheckoutError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    fn session_url(&self, id: &SessionId, action: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("checkout_sessions").push(id.as_str());
            if let Some(action) = action {
                segments.push(action);
            }
        }
        url
    }
}

fn transport(err: reqwest::Error) -> CheckoutError {
    CheckoutError::StoreUnavailable(err.to_string())
}

/// Map a non-success status to a store error
async fn unexpected(id: &SessionId, response: Response) -> CheckoutError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(session_id = %id, status = %status, body = %body, "Merchant API error");

    if status == StatusCode::NOT_FOUND {
        CheckoutError::SessionNotFound(id.to_string())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        CheckoutError::StoreUnavailable(format!("merchant returned {}", status))
    } else {
        CheckoutError::Store(format!("merchant returned {}: {}", status, body))
    }
}

async fn conflict_body(response: Response) -> ConflictBody {
    response.json().await.unwrap_or_default()
}

#[async_trait]
impl SessionStore for HttpMerchantStore {
    async fn get_session(&self, id: &SessionId) -> Result<Option<CheckoutSession>> {
        let response = self
            .client
            .get(self.session_url(id, None))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let session = response
                    .json::<CheckoutSession>()
                    .await
                    .map_err(|e| CheckoutError::Store(format!("invalid session payload: {}", e)))?;
                Ok(Some(session))
            }
            _ => Err(unexpected(id, response).await),
        }
    }

    async fn record_payment(&self, id: &SessionId, authorization: PaymentAuthorization) -> Result<()> {
        let requested = authorization.amount;
        let response = self
            .client
            .post(self.session_url(id, Some("payment")))
            .json(&authorization)
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            s if s.is_success() => {
                tracing::debug!(session_id = %id, authorization_id = %authorization.id, "Payment recorded with merchant");
                Ok(())
            }
            StatusCode::CONFLICT => {
                let body = conflict_body(response).await;
                Err(CheckoutError::FinalizationConflict {
                    session_id: id.to_string(),
                    recorded: body.recorded_amount.unwrap_or_default(),
                    requested,
                })
            }
            _ => Err(unexpected(id, response).await),
        }
    }

    async fn complete_session(&self, id: &SessionId) -> Result<OrderResult> {
        let response = self
            .client
            .post(self.session_url(id, Some("complete")))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            s if s.is_success() => {
                let order = response
                    .json::<OrderResult>()
                    .await
                    .map_err(|e| CheckoutError::Store(format!("invalid order payload: {}", e)))?;
                tracing::info!(session_id = %id, order_id = %order.order_id, "Merchant completed session");
                Ok(order)
            }
            StatusCode::CONFLICT => {
                let body = conflict_body(response).await;
                Err(CheckoutError::InvalidTransition {
                    session_id: id.to_string(),
                    from: body
                        .status
                        .map_or_else(|| "UNKNOWN".to_string(), |s| s.as_str().to_string()),
                    to: SessionStatus::Completed.as_str().to_string(),
                })
            }
            _ => Err(unexpected(id, response).await),
        }
    }
}
