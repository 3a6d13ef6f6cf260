//! Server Configuration

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3112";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3112";
const DEV_PSP_SECRET: &str = "dev-psp-signing-secret";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be an http(s) URL, got '{value}'")]
    InvalidUrl { name: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Settings read from the environment (after `.env` is loaded)
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Origin the payment form posts back to
    pub public_base_url: String,

    /// Merchant checkout API; in-memory sessions when unset
    pub merchant_api_url: Option<String>,

    /// Seeded demo session for the in-memory store
    pub demo_session_id: Option<String>,

    pub psp_signing_secret: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let public_base_url = get("PUBLIC_BASE_URL").unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.into());
        let public_base_url = http_url("PUBLIC_BASE_URL", public_base_url)?;

        let merchant_api_url = get("MERCHANT_API_URL")
            .map(|url| http_url("MERCHANT_API_URL", url))
            .transpose()?;

        let psp_signing_secret = match lookup("PSP_SIGNING_SECRET") {
            Some(secret) if secret.is_empty() => return Err(ConfigError::Empty("PSP_SIGNING_SECRET")),
            Some(secret) => secret,
            None => {
                tracing::warn!("⚠ PSP_SIGNING_SECRET not set - using development secret");
                DEV_PSP_SECRET.into()
            }
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            public_base_url,
            merchant_api_url,
            demo_session_id: get("DEMO_SESSION_ID"),
            psp_signing_secret,
        })
    }

    /// Absolute URL of the handshake endpoint baked into the form
    pub fn payment_endpoint(&self) -> String {
        format!("{}{}", self.public_base_url, merchant_checkout::PAYMENT_ENDPOINT_PATH)
    }
}

fn http_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(ConfigError::InvalidUrl { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3112");
        assert_eq!(config.payment_endpoint(), "http://localhost:3112/payment/process");
        assert!(config.merchant_api_url.is_none());
        assert!(config.demo_session_id.is_none());
        assert_eq!(config.psp_signing_secret, DEV_PSP_SECRET);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("PUBLIC_BASE_URL", "https://shop.example.com/"),
            ("MERCHANT_API_URL", "https://merchant.example.com/api"),
            ("DEMO_SESSION_ID", "demo"),
            ("PSP_SIGNING_SECRET", "s3cret"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.payment_endpoint(), "https://shop.example.com/payment/process");
        assert_eq!(config.merchant_api_url.as_deref(), Some("https://merchant.example.com/api"));
        assert_eq!(config.demo_session_id.as_deref(), Some("demo"));
        assert_eq!(config.psp_signing_secret, "s3cret");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            config(&[("PUBLIC_BASE_URL", "localhost:3112")]),
            Err(ConfigError::InvalidUrl { name: "PUBLIC_BASE_URL", .. })
        ));
        assert!(matches!(
            config(&[("PSP_SIGNING_SECRET", "")]),
            Err(ConfigError::Empty("PSP_SIGNING_SECRET"))
        ));
    }
}
