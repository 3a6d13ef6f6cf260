//! HTTP Handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use checkout_core::{CheckoutError, OrderResult, SessionId, ToolCall, ToolResult, ToolSchema};
use checkout_payments::{FieldErrors, PaymentError, PaymentSubmission};
use merchant_checkout::SESSION_HEADER;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub tools: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            fields: None,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Body rejections keep the `{error, code}` shape
fn malformed_body(rejection: &JsonRejection, code: &str) -> ApiError {
    tracing::info!(error = %rejection.body_text(), "Rejected malformed request body");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("The request body could not be read.", code)),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocationRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub id: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store_kind,
        tools: state.tools.len(),
    })
}

/// Schemas of the registered tools
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSchema>> {
    Json(state.tools.schemas())
}

/// Host tool invocation
///
/// Gate denials come back as a 200 with `isError: true`; only transport or
/// store failures become HTTP errors.
pub async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<ToolInvocationRequest>, JsonRejection>,
) -> Result<Json<ToolResult>, ApiError> {
    let Json(payload) = payload.map_err(|e| malformed_body(&e, "INVALID_REQUEST"))?;
    let call = ToolCall {
        name,
        arguments: payload.arguments,
        id: payload.id,
        session_id: payload.session_id.map(SessionId::from_string),
    };

    let result = state.tools.execute(&call).await.map_err(|e| {
        let status = match &e {
            CheckoutError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            CheckoutError::ToolValidation(_) => StatusCode::BAD_REQUEST,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(tool = %call.name, error = %e, "Tool invocation failed");
        (status, Json(ErrorResponse::new(e.user_message(), "TOOL_ERROR")))
    })?;

    Ok(Json(result))
}

/// Payment handshake endpoint (`POST /payment/process`)
pub async fn process_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    submission: Result<Json<PaymentSubmission>, JsonRejection>,
) -> Result<Json<OrderResult>, ApiError> {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(SessionId::from_string)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Missing checkout session",
                    "MISSING_SESSION",
                )),
            )
        })?;

    let Json(submission) = submission.map_err(|e| malformed_body(&e, "REJECTED_INVALID_INPUT"))?;

    let order = state
        .handshake
        .process(&session_id, &submission)
        .await
        .map_err(payment_error)?;

    Ok(Json(order))
}

fn payment_error(e: PaymentError) -> ApiError {
    let message = e.user_message();
    match e {
        PaymentError::InvalidInput(fields) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: message,
                code: "REJECTED_INVALID_INPUT".into(),
                fields: Some(fields),
            }),
        ),
        PaymentError::NotAllowed(reason) => {
            let status = match reason {
                checkout_core::GateDenial::NoActiveSession => StatusCode::NOT_FOUND,
                _ => StatusCode::CONFLICT,
            };
            (status, Json(ErrorResponse::new(message, reason.code())))
        }
        PaymentError::DelegationFailed(_) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::new(message, "PSP_DELEGATION_FAILED")),
        ),
        PaymentError::Finalization {
            source: CheckoutError::FinalizationConflict { .. },
            ..
        } => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(
                "Payment could not be completed.",
                "SESSION_FINALIZATION_CONFLICT",
            )),
        ),
        PaymentError::Session(e) if e.is_retryable() => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(message, "STORE_UNAVAILABLE")),
        ),
        PaymentError::Finalization { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(message, "FINALIZATION_FAILED")),
        ),
        PaymentError::Session(_) | PaymentError::Config(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(message, "PAYMENT_ERROR")),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use checkout_core::{
        Address, CheckoutSession, ContactInfo, MemorySessionStore, SessionStatus, SessionStore,
        TotalLine, ToolRegistry,
    };
    use checkout_payments::{MockPaymentProvider, PaymentHandshake};
    use merchant_checkout::{tools::CollectPaymentDetailsTool, COLLECT_PAYMENT_TOOL};

    use crate::build_router;

    fn app(store: Arc<MemorySessionStore>) -> Router {
        let mut tools = ToolRegistry::new();
        tools.register(CollectPaymentDetailsTool::new(
            store.clone(),
            "http://localhost:3112/payment/process",
            checkout_payments::ExpiryWindow::current(),
        ));
        let handshake = PaymentHandshake::new(store, Arc::new(MockPaymentProvider::new("test-secret")));

        build_router(AppState {
            tools: Arc::new(tools),
            handshake: Arc::new(handshake),
            store_kind: "memory",
        })
    }

    fn ready_session(id: &str, total: i64) -> CheckoutSession {
        CheckoutSession::new(SessionId::from_string(id))
            .with_contact_info(ContactInfo::new("Ada", "Lovelace", "ada@example.com"))
            .with_shipping_address(Address {
                line1: "1 Main St".into(),
                city: "London".into(),
                postal_code: "N1".into(),
                country: "GB".into(),
                ..Default::default()
            })
            .with_totals(vec![TotalLine::new("total", total)])
    }

    fn valid_card() -> Value {
        let year = checkout_payments::ExpiryWindow::current().years()[1].clone();
        json!({
            "cardName": "Ada Lovelace",
            "cardNumber": "4242 4242 4242 4242",
            "expMonth": "12",
            "expYear": year,
            "cvc": "123"
        })
    }

    fn pay(session_id: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/payment/process")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(id) = session_id {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(Arc::new(MemorySessionStore::new()));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["tools"], 1);
    }

    #[tokio::test]
    async fn test_list_tools() {
        let app = app(Arc::new(MemorySessionStore::new()));
        let request = Request::builder().uri("/api/tools").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], COLLECT_PAYMENT_TOOL);
    }

    #[tokio::test]
    async fn test_payment_completes_session() {
        let store = Arc::new(MemorySessionStore::new());
        store.insert(ready_session("cs_1", 2500)).unwrap();
        let app = app(store.clone());

        let (status, body) = send(&app, pay(Some("cs_1"), &valid_card())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount"], 2500);
        assert!(body["orderId"].as_str().unwrap().starts_with("ord_"));

        let session = store.get_session(&SessionId::from_string("cs_1")).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_duplicate_submission_returns_same_order() {
        let store = Arc::new(MemorySessionStore::new());
        store.insert(ready_session("cs_1", 4999)).unwrap();
        let app = app(store);

        let (_, first) = send(&app, pay(Some("cs_1"), &valid_card())).await;
        let (status, second) = send(&app, pay(Some("cs_1"), &valid_card())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["orderId"], second["orderId"]);
    }

    #[tokio::test]
    async fn test_short_card_number_rejected() {
        let store = Arc::new(MemorySessionStore::new());
        store.insert(ready_session("cs_1", 2500)).unwrap();
        let app = app(store.clone());

        let mut card = valid_card();
        card["cardNumber"] = json!("4242424242");
        let (status, body) = send(&app, pay(Some("cs_1"), &card)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "REJECTED_INVALID_INPUT");
        assert!(body["fields"].get("cardNumber").is_some());

        let session = store.get_session(&SessionId::from_string("cs_1")).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.payment.is_none());
    }

    #[tokio::test]
    async fn test_missing_session_header() {
        let app = app(Arc::new(MemorySessionStore::new()));
        let (status, body) = send(&app, pay(None, &valid_card())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_SESSION");
    }

    #[tokio::test]
    async fn test_unknown_session_not_found() {
        let app = app(Arc::new(MemorySessionStore::new()));
        let (status, body) = send(&app, pay(Some("cs_missing"), &valid_card())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NO_ACTIVE_SESSION");
    }

    #[tokio::test]
    async fn test_tool_denies_without_shipping() {
        let store = Arc::new(MemorySessionStore::new());
        store
            .insert(
                CheckoutSession::new(SessionId::from_string("cs_1"))
                    .with_contact_info(ContactInfo::new("Ada", "Lovelace", "ada@example.com"))
                    .with_totals(vec![TotalLine::new("total", 2500)]),
            )
            .unwrap();
        let app = app(store);

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/tools/{}", COLLECT_PAYMENT_TOOL))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"sessionId": "cs_1"}).to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isError"], true);
        assert_eq!(body["content"][0]["type"], "text");
        assert!(body["content"]
            .as_array()
            .unwrap()
            .iter()
            .all(|block| block["type"] != "resource"));
    }

    #[tokio::test]
    async fn test_tool_renders_form() {
        let store = Arc::new(MemorySessionStore::new());
        store.insert(ready_session("cs_1", 2500)).unwrap();
        let app = app(store);

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/tools/{}", COLLECT_PAYMENT_TOOL))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"sessionId": "cs_1", "id": "call-7"}).to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.get("isError").is_none());
        assert_eq!(body["id"], "call-7");
        let resource = &body["content"][0]["resource"];
        assert!(resource["uri"].as_str().unwrap().starts_with("ui://payment/"));
        assert_eq!(resource["mimeType"], "text/html");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let app = app(Arc::new(MemorySessionStore::new()));
        let request = Request::builder()
            .method("POST")
            .uri("/api/tools/does_not_exist")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_payment_body_is_json_error() {
        let store = Arc::new(MemorySessionStore::new());
        store.insert(ready_session("cs_1", 2500)).unwrap();
        let app = app(store.clone());

        let mut card = valid_card();
        card["cardNumber"] = json!(4_242_424_242_424_242_u64);
        let (status, body) = send(&app, pay(Some("cs_1"), &card)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "REJECTED_INVALID_INPUT");
        assert!(body["error"].is_string());

        let request = Request::builder()
            .method("POST")
            .uri("/payment/process")
            .header(SESSION_HEADER, "cs_1")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let session = store.get_session(&SessionId::from_string("cs_1")).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_malformed_tool_body_is_json_error() {
        let app = app(Arc::new(MemorySessionStore::new()));
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/tools/{}", COLLECT_PAYMENT_TOOL))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"sessionId": 7}"#))
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    #[test]
    fn test_amount_conflict_maps_to_409() {
        let (status, Json(body)) = payment_error(PaymentError::Finalization {
            session_id: "cs_1".into(),
            authorization_id: "auth_1".into(),
            source: CheckoutError::FinalizationConflict {
                session_id: "cs_1".into(),
                recorded: 2500,
                requested: 3000,
            },
        });
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "SESSION_FINALIZATION_CONFLICT");

        let (status, Json(body)) = payment_error(PaymentError::Finalization {
            session_id: "cs_1".into(),
            authorization_id: "auth_1".into(),
            source: CheckoutError::Store("disk full".into()),
        });
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "FINALIZATION_FAILED");
    }
}
