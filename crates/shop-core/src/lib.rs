//! # shop-core
//!
//! Core types and traits for the digital storefront.
//!
//! This crate provides:
//! - `Product` and `ProductCatalog` for the static product catalog
//! - `Order` and the `OrderStatus` state machine for the purchase lifecycle
//! - `OrderSession` for per-session checkout state
//! - `PaymentGateway` and `FileHost` traits for the remote collaborators
//! - `CheckoutFlow`, the controller sequencing them
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CheckoutFlow, CheckoutUrls, ConfirmOutcome, OrderSession};
//!
//! let flow = CheckoutFlow::new(gateway, file_host, catalog, CheckoutUrls::new(base_url));
//! let mut session = OrderSession::new();
//!
//! // Pay: create the order and send the buyer to the approval link
//! let pending = flow.begin(&mut session, "xml-key-generator-v4").await?;
//!
//! // Confirm: capture once approved, then deliver the file
//! match flow.confirm(&mut session, "xml-key-generator-v4").await? {
//!     ConfirmOutcome::Pending { approval_url, .. } => { /* still waiting */ }
//!     ConfirmOutcome::Delivered(delivery) => { /* expose the download */ }
//! }
//! ```

pub mod delivery;
pub mod error;
pub mod flow;
pub mod order;
pub mod product;
pub mod session;
pub mod strategy;

// Re-exports for convenience
pub use delivery::{Delivery, DeliveryMode, FileMetadata};
pub use error::{ShopError, ShopResult};
pub use flow::{CheckoutFlow, ConfirmOutcome, PendingApproval};
pub use order::{AccessToken, GatewayOrder, Order, OrderLink, OrderRequest, OrderStatus};
pub use product::{Currency, Price, Product, ProductCatalog};
pub use session::{OrderSession, SessionView};
pub use strategy::{BoxedFileHost, BoxedPaymentGateway, CheckoutUrls, FileHost, PaymentGateway};
