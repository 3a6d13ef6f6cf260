//! Payment Form Surface
//!
//! Renders the self-contained payment-entry document handed to the host.
//! The document validates every field locally and only then posts the five
//! card fields to the handshake endpoint. Acknowledging the success dialog
//! posts the completion signal to the parent window.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use checkout_core::{message::script_safe, CheckoutSession, CompletionSignal, HostMessage, Result, UiResource};
use checkout_payments::{ExpiryWindow, MIN_CARD_NUMBER_LEN, MIN_CVC_LEN};

/// Header carrying the session id on payment submissions
pub const SESSION_HEADER: &str = "x-checkout-session";

/// Path of the payment handshake endpoint
pub const PAYMENT_ENDPOINT_PATH: &str = "/payment/process";

const TEMPLATE: &str = include_str!("payment_form.html");

/// Format minor units as a two-decimal dollar amount (`4999` -> `$49.99`)
pub fn format_minor_units(amount: i64) -> String {
    let major = Decimal::from_i128_with_scale(i128::from(amount).abs(), 2);
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}${:.2}", sign, major)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestData {
    exp_month: String,
    exp_year: String,
}

/// Values the form script reads at runtime
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SurfaceConfig<'a> {
    endpoint: &'a str,
    session_header: &'static str,
    session_id: &'a str,
    total_amount: i64,
    total_display: String,
    min_card_number_length: usize,
    min_cvc_length: usize,
    test_data: TestData,
    completion: HostMessage,
}

/// Produces payment-entry surfaces for sessions the gate has allowed
#[derive(Clone, Debug)]
pub struct PaymentFormProducer {
    window: ExpiryWindow,
    completion: CompletionSignal,
}

impl PaymentFormProducer {
    pub fn new(window: ExpiryWindow, completion: CompletionSignal) -> Self {
        Self { window, completion }
    }

    /// Render the form bound to `endpoint`
    ///
    /// Identical inputs give identical documents; only the resource URI is
    /// fresh per render.
    pub fn build_surface(
        &self,
        session: &CheckoutSession,
        total_amount: i64,
        endpoint: &str,
    ) -> Result<UiResource> {
        let total_display = format_minor_units(total_amount);
        let years = self.window.years();

        let config = SurfaceConfig {
            endpoint,
            session_header: SESSION_HEADER,
            session_id: session.id.as_str(),
            total_amount,
            total_display: total_display.clone(),
            min_card_number_length: MIN_CARD_NUMBER_LEN,
            min_cvc_length: MIN_CVC_LEN,
            test_data: TestData {
                exp_month: "12".into(),
                exp_year: years.last().cloned().unwrap_or_default(),
            },
            completion: self.completion.to_host_message(),
        };
        let config_json = script_safe(&serde_json::to_string(&config)?);

        let html = TEMPLATE
            .replace("__TOTAL_DISPLAY__", &total_display)
            .replace("__MONTH_OPTIONS__", &options(&self.window.months()))
            .replace("__YEAR_OPTIONS__", &options(&years))
            .replace("__CONFIG_JSON__", &config_json);

        Ok(UiResource::html(format!("ui://payment/{}", Uuid::new_v4()), html))
    }
}

fn options(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("          <option value=\"{v}\">{v}</option>"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::SessionId;
    use rust_decimal_macros::dec;

    fn producer() -> PaymentFormProducer {
        PaymentFormProducer::new(
            ExpiryWindow::new(2025, 6),
            CompletionSignal::for_tool("collect_payment_details"),
        )
    }

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(4999), "$49.99");
        assert_eq!(format_minor_units(2500), "$25.00");
        assert_eq!(format_minor_units(5), "$0.05");
        assert_eq!(format_minor_units(0), "$0.00");
        assert_eq!(format_minor_units(-150), "-$1.50");
    }

    #[test]
    fn test_display_matches_division_by_100() {
        for amount in [1_i64, 99, 100, 12_345, 1_000_000] {
            let expected = Decimal::from(amount) / dec!(100);
            assert_eq!(format_minor_units(amount), format!("${:.2}", expected));
        }
    }

    #[test]
    fn test_surface_contents() {
        let session = CheckoutSession::new(SessionId::from_string("sess-1"));
        let surface = producer()
            .build_surface(&session, 4999, "http://localhost:3112/payment/process")
            .unwrap();

        assert!(surface.uri.starts_with("ui://payment/"));
        assert_eq!(surface.mime_type, "text/html");
        assert!(surface.text.contains("Complete Purchase - $49.99"));
        assert!(surface.text.contains(r#"<option value="12">12</option>"#));
        assert!(surface.text.contains(r#"<option value="2030">2030</option>"#));
        assert!(!surface.text.contains(r#"<option value="2031">"#));
        assert!(surface.text.contains(r#""endpoint":"http://localhost:3112/payment/process""#));
        assert!(surface.text.contains(r#""sessionId":"sess-1""#));
        assert!(surface.text.contains(r#""toolName":"collect_payment_details""#));
        assert!(!surface.text.contains("__"), "unfilled placeholder");
        for field in ["cardName", "cardNumber", "expMonth", "expYear", "cvc"] {
            assert!(surface.text.contains(&format!("id=\"{field}Error\"")), "{field}");
        }
    }

    #[test]
    fn test_rerender_differs_only_in_uri() {
        let session = CheckoutSession::new(SessionId::from_string("sess-1"));
        let first = producer().build_surface(&session, 2500, "/payment/process").unwrap();
        let second = producer().build_surface(&session, 2500, "/payment/process").unwrap();

        assert_ne!(first.uri, second.uri);
        assert_eq!(first.text, second.text);
    }

    #[test]
    fn test_session_id_cannot_break_out_of_script() {
        let session = CheckoutSession::new(SessionId::from_string("</script><script>alert(1)"));
        let surface = producer().build_surface(&session, 100, "/payment/process").unwrap();
        assert_eq!(surface.text.matches("</script>").count(), 1);
    }
}
