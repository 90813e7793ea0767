//! # PayPal Configuration
//!
//! Configuration management for the PayPal integration.
//! Credentials are loaded from environment variables (or a `.env` file).

use shop_core::ShopError;
use std::env;
use std::str::FromStr;

const SANDBOX_API_BASE: &str = "https://api-m.sandbox.paypal.com";
const LIVE_API_BASE: &str = "https://api-m.paypal.com";

/// Sandbox vs live account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayPalMode {
    Sandbox,
    Live,
}

impl PayPalMode {
    pub fn api_base_url(&self) -> &'static str {
        match self {
            PayPalMode::Sandbox => SANDBOX_API_BASE,
            PayPalMode::Live => LIVE_API_BASE,
        }
    }
}

impl FromStr for PayPalMode {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(PayPalMode::Sandbox),
            "live" => Ok(PayPalMode::Live),
            other => Err(ShopError::Configuration(format!(
                "PAYPAL_MODE must be 'sandbox' or 'live', got '{}'",
                other
            ))),
        }
    }
}

/// PayPal REST API configuration
#[derive(Clone)]
pub struct PayPalConfig {
    /// REST app client id
    pub client_id: String,

    /// REST app secret
    pub secret: String,

    /// Sandbox or live
    pub mode: PayPalMode,

    /// API base URL (derived from the mode, overridable for testing)
    pub api_base_url: String,

    /// Brand name shown on the approval page
    pub brand_name: Option<String>,
}

impl PayPalConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PAYPAL_CLIENT_ID`
    /// - `PAYPAL_SECRET`
    ///
    /// Optional:
    /// - `PAYPAL_MODE` (`sandbox` by default)
    /// - `STORE_NAME`
    pub fn from_env() -> Result<Self, ShopError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let client_id = env::var("PAYPAL_CLIENT_ID")
            .map_err(|_| ShopError::Configuration("PAYPAL_CLIENT_ID not set".to_string()))?;

        let secret = env::var("PAYPAL_SECRET")
            .map_err(|_| ShopError::Configuration("PAYPAL_SECRET not set".to_string()))?;

        if client_id.trim().is_empty() || secret.trim().is_empty() {
            return Err(ShopError::Configuration(
                "PAYPAL_CLIENT_ID and PAYPAL_SECRET must not be empty".to_string(),
            ));
        }

        let mode = match env::var("PAYPAL_MODE") {
            Ok(value) => value.parse()?,
            Err(_) => PayPalMode::Sandbox,
        };

        let mut config = Self::new(client_id, secret, mode);
        config.brand_name = env::var("STORE_NAME").ok().filter(|s| !s.is_empty());
        Ok(config)
    }

    /// Create config with explicit values
    pub fn new(client_id: impl Into<String>, secret: impl Into<String>, mode: PayPalMode) -> Self {
        Self {
            client_id: client_id.into(),
            secret: secret.into(),
            mode,
            api_base_url: mode.api_base_url().to_string(),
            brand_name: None,
        }
    }

    /// Check if using the sandbox
    pub fn is_sandbox(&self) -> bool {
        self.mode == PayPalMode::Sandbox
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder: set the brand name shown to the buyer
    pub fn with_brand_name(mut self, name: impl Into<String>) -> Self {
        self.brand_name = Some(name.into());
        self
    }
}

impl std::fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("mode", &self.mode)
            .field("api_base_url", &self.api_base_url)
            .field("brand_name", &self.brand_name)
            .finish()
    }
}
