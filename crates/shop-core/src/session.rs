//! # Order Session
//!
//! State owned by one interactive session: at most one in-flight order,
//! the transient gateway token, and the last delivery.
//! Only the checkout flow mutates it.

use crate::delivery::Delivery;
use crate::order::{AccessToken, Order, OrderStatus};
use serde::Serialize;

/// Per-session checkout state
#[derive(Debug, Default)]
pub struct OrderSession {
    order: Option<Order>,
    token: Option<AccessToken>,
    delivery: Option<Delivery>,
}

impl OrderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The in-flight order, if any
    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub(crate) fn order_mut(&mut self) -> Option<&mut Order> {
        self.order.as_mut()
    }

    /// The last completed delivery, if any
    pub fn delivery(&self) -> Option<&Delivery> {
        self.delivery.as_ref()
    }

    /// Gateway token, unless it is about to expire
    pub(crate) fn live_token(&self) -> Option<&AccessToken> {
        self.token.as_ref().filter(|t| !t.is_expired())
    }

    pub(crate) fn store_token(&mut self, token: AccessToken) {
        self.token = Some(token);
    }

    pub(crate) fn forget_token(&mut self) {
        self.token = None;
    }

    pub(crate) fn start_order(&mut self, order: Order) -> Option<Order> {
        self.order.replace(order)
    }

    pub(crate) fn clear_order(&mut self) -> Option<Order> {
        self.order.take()
    }

    /// Record a delivery and drop the order so it cannot be captured again
    pub(crate) fn complete(&mut self, delivery: Delivery) {
        self.order = None;
        self.delivery = Some(delivery);
    }

    /// Paid but not yet delivered
    pub fn has_undelivered_payment(&self) -> bool {
        self.order
            .as_ref()
            .map(|o| o.status == OrderStatus::Completed)
            .unwrap_or(false)
    }

    /// Forget everything (session end)
    pub fn clear(&mut self) {
        self.order = None;
        self.token = None;
        self.delivery = None;
    }

    /// Serializable view without secrets or file content
    pub fn view(&self) -> SessionView {
        SessionView {
            order: self.order.clone(),
            delivery: self.delivery.clone(),
        }
    }
}

/// Public snapshot of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
}
