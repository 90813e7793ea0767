//! # Order Types
//!
//! Order lifecycle types for the storefront.
//!
//! The payment gateway is authoritative for an order's status; the storefront
//! only observes it. Every observed status passes through
//! [`OrderStatus::transition`] before it is recorded.
//!
//! ```text
//!   Created ──(buyer approves at gateway)──▶ Approved ──(capture)──▶ Completed
//!      │                                        │
//!      └────────────────────┬───────────────────┘
//!                           ▼
//!                         Failed
//! ```

use crate::error::{ShopError, ShopResult};
use crate::product::{Price, Product};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order exists at the gateway, buyer has not approved yet
    Created,
    /// Buyer approved; funds can be captured
    Approved,
    /// Payment captured
    Completed,
    /// Voided, declined or otherwise dead
    Failed,
}

impl OrderStatus {
    /// Map a gateway status string onto the lifecycle.
    ///
    /// Unknown strings are rejected instead of being folded into another state.
    pub fn from_remote(order_id: &str, status: &str) -> ShopResult<Self> {
        match status {
            "CREATED" | "SAVED" | "PAYER_ACTION_REQUIRED" => Ok(OrderStatus::Created),
            "APPROVED" => Ok(OrderStatus::Approved),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "VOIDED" | "DECLINED" | "FAILED" => Ok(OrderStatus::Failed),
            other => Err(ShopError::UnexpectedStatus {
                order_id: order_id.to_string(),
                status: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Failed => "FAILED",
        }
    }

    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    /// Check whether moving from `self` to `next` is a legal observation
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Created, _) => true,
            (Approved, Approved | Completed | Failed) => true,
            (Approved, Created) => false,
            (Completed, Completed) => true,
            (Completed, _) => false,
            (Failed, Failed) => true,
            (Failed, _) => false,
        }
    }

    /// Total transition function over observed statuses
    pub fn transition(self, order_id: &str, next: OrderStatus) -> ShopResult<OrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ShopError::InvalidTransition {
                order_id: order_id.to_string(),
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order creation request sent to the payment gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Amount to charge
    pub amount: Price,
    /// Description shown to the buyer
    pub description: String,
    /// Our reference for the purchase (product id)
    pub reference_id: String,
    /// Where the gateway sends the buyer after approval
    pub return_url: String,
    /// Where the gateway sends the buyer on cancel
    pub cancel_url: String,
}

impl OrderRequest {
    /// Build a request charging exactly the product's price
    pub fn for_product(product: &Product, return_url: &str, cancel_url: &str) -> Self {
        Self {
            amount: product.price,
            description: product.name.clone(),
            reference_id: product.id.clone(),
            return_url: return_url.to_string(),
            cancel_url: cancel_url.to_string(),
        }
    }
}

/// A HATEOAS link returned by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLink {
    pub rel: String,
    pub href: String,
}

/// Order as reported by the payment gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Gateway order id (opaque)
    pub id: String,
    /// Status, already mapped onto the lifecycle
    pub status: OrderStatus,
    /// Amount of the first purchase unit, when the gateway echoes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Price>,
    /// Links (approve, self, capture...)
    #[serde(default)]
    pub links: Vec<OrderLink>,
}

impl GatewayOrder {
    /// URL the buyer must visit to approve the order
    pub fn approval_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.as_str())
    }
}

/// Session-local record of the in-flight order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Gateway order id
    pub id: String,
    /// Product being bought
    pub product_id: String,
    /// Amount charged
    pub amount: Price,
    /// Last observed status
    pub status: OrderStatus,
    /// Buyer approval link
    pub approval_url: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Record a freshly created gateway order for `product`
    pub fn from_gateway(
        provider: &str,
        product: &Product,
        created: &GatewayOrder,
    ) -> ShopResult<Self> {
        let approval_url = created.approval_url().ok_or_else(|| ShopError::Gateway {
            provider: provider.to_string(),
            status: 200,
            message: format!("Order {} has no approval link", created.id),
        })?;

        Ok(Self {
            id: created.id.clone(),
            product_id: product.id.clone(),
            amount: created.amount.unwrap_or(product.price),
            status: created.status,
            approval_url: approval_url.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Apply a status observed at the gateway
    pub fn observe(&mut self, status: OrderStatus) -> ShopResult<OrderStatus> {
        self.status = self.status.transition(&self.id, status)?;
        Ok(self.status)
    }

    /// Check the order was created for the selected product
    pub fn ensure_product(&self, selected_product: &str) -> ShopResult<()> {
        if self.product_id == selected_product {
            Ok(())
        } else {
            Err(ShopError::ProductMismatch {
                order_id: self.id.clone(),
                order_product: self.product_id.clone(),
                selected_product: selected_product.to_string(),
            })
        }
    }
}

/// Bearer token issued by a remote service
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Margin before the reported expiry after which the token is not reused
    pub const EXPIRY_MARGIN_SECS: i64 = 60;

    /// Create a token from the `expires_in` seconds a token endpoint reports
    pub fn new(value: impl Into<String>, expires_in_secs: i64) -> Self {
        Self {
            value: value.into(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    /// Check if the token should be replaced
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(Self::EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    /// Authorization header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}
