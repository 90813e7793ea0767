//! # Remote Service Traits
//!
//! Strategy traits for the two remote collaborators of the checkout flow:
//! the payment gateway and the file host.
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │   PaymentGateway (trait)     │   │      FileHost (trait)        │
//! │  ├── acquire_token()         │   │  ├── fetch_metadata()        │
//! │  ├── create_order()          │   │  ├── fetch_content()         │
//! │  ├── get_order()             │   │  └── generate_link()         │
//! │  └── capture_order()         │   │                              │
//! └──────────────▲───────────────┘   └──────────────▲───────────────┘
//!                │                                  │
//!        ┌───────┴───────┐                  ┌───────┴───────┐
//!        │ PayPalGateway │                  │  DriveClient  │
//!        └───────────────┘                  └───────────────┘
//! ```

use crate::delivery::FileMetadata;
use crate::error::ShopResult;
use crate::order::{AccessToken, GatewayOrder, OrderRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Payment gateway operations used by the checkout flow.
///
/// The gateway is authoritative for order status; implementations never
/// cache or guess it.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Exchange the configured client credentials for a bearer token.
    ///
    /// Non-2xx answers are `ShopError::Auth`.
    async fn acquire_token(&self) -> ShopResult<AccessToken>;

    /// Create an order to be approved by the buyer out-of-band.
    ///
    /// The returned order must carry an approval link.
    async fn create_order(
        &self,
        token: &AccessToken,
        request: &OrderRequest,
    ) -> ShopResult<GatewayOrder>;

    /// Read-only status probe.
    async fn get_order(&self, token: &AccessToken, order_id: &str) -> ShopResult<GatewayOrder>;

    /// Capture an approved order.
    async fn capture_order(&self, token: &AccessToken, order_id: &str)
        -> ShopResult<GatewayOrder>;

    /// Get the provider name (for logging and errors).
    fn provider_name(&self) -> &'static str;
}

/// File host operations used to deliver purchases.
#[async_trait]
pub trait FileHost: Send + Sync {
    /// Name and MIME type of a file.
    async fn fetch_metadata(&self, file_ref: &str) -> ShopResult<FileMetadata>;

    /// Full file content, buffered.
    async fn fetch_content(&self, file_ref: &str) -> ShopResult<Vec<u8>>;

    /// A download URL for a file whose metadata was already fetched.
    /// Expiry is governed by the host, not by us.
    async fn generate_link(&self, file_ref: &str, metadata: &FileMetadata) -> ShopResult<String>;

    /// Get the host name (for logging).
    fn host_name(&self) -> &'static str;
}

/// Type alias for a shared payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

/// Type alias for a shared file host (dynamic dispatch)
pub type BoxedFileHost = Arc<dyn FileHost>;

/// URLs the gateway redirects the buyer to after approval or cancel
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the application (e.g., "https://store.example.com")
    pub base_url: String,
    /// Return page path
    pub return_path: String,
    /// Cancel page path
    pub cancel_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            return_path: "/checkout/return".to_string(),
            cancel_path: "/checkout/cancel".to_string(),
        }
    }

    pub fn return_url(&self) -> String {
        format!("{}{}", self.base_url, self.return_path)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}{}", self.base_url, self.cancel_path)
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_urls() {
        let urls = CheckoutUrls::new("https://store.example.com/");

        assert_eq!(urls.return_url(), "https://store.example.com/checkout/return");
        assert_eq!(urls.cancel_url(), "https://store.example.com/checkout/cancel");
    }
}
