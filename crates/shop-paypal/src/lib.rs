//! # shop-paypal
//!
//! PayPal payment gateway for the digital storefront.
//!
//! Implements `shop_core::PaymentGateway` on top of the PayPal REST API:
//!
//! | Operation       | Endpoint                                   |
//! |-----------------|--------------------------------------------|
//! | `acquire_token` | `POST /v1/oauth2/token`                    |
//! | `create_order`  | `POST /v2/checkout/orders`                 |
//! | `get_order`     | `GET /v2/checkout/orders/{id}`             |
//! | `capture_order` | `POST /v2/checkout/orders/{id}/capture`    |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_paypal::PayPalGateway;
//! use shop_core::{OrderRequest, PaymentGateway};
//!
//! // Create gateway from environment (PAYPAL_CLIENT_ID, PAYPAL_SECRET, PAYPAL_MODE)
//! let gateway = PayPalGateway::from_env()?;
//!
//! let token = gateway.acquire_token().await?;
//! let order = gateway.create_order(&token, &request).await?;
//!
//! // Send the buyer to order.approval_url(), then capture
//! let captured = gateway.capture_order(&token, &order.id).await?;
//! ```

pub mod config;
pub mod gateway;

// Re-exports
pub use config::{PayPalConfig, PayPalMode};
pub use gateway::PayPalGateway;
