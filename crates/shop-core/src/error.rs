//! # Storefront Error Types
//!
//! Typed error handling for the storefront checkout flow.
//! All gateway, file-host and flow operations return `Result<T, ShopError>`.
//!
//! No variant is retried automatically; every error is surfaced to the caller.

use thiserror::Error;

/// Core error type for all storefront operations
#[derive(Debug, Error)]
pub enum ShopError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Product not found in catalog (or not purchasable)
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// Credential or token failure at the payment gateway
    #[error("Authentication failed [{provider}]: {message}")]
    Auth { provider: String, message: String },

    /// Non-2xx answer from the payment gateway, message kept verbatim
    #[error("Gateway error [{provider}] (HTTP {status}): {message}")]
    Gateway {
        provider: String,
        status: u16,
        message: String,
    },

    /// Network/HTTP transport error talking to a remote service
    #[error("Network error: {0}")]
    Network(String),

    /// Remote order status outside the set expected at this step
    #[error("Unexpected order status for {order_id}: {status}")]
    UnexpectedStatus { order_id: String, status: String },

    /// Observed status would move the order backwards or out of a terminal state
    #[error("Invalid order transition for {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: String,
        from: String,
        to: String,
    },

    /// The gateway reports the payment as failed, voided or declined
    #[error("Payment failed for order {order_id}: status {status}")]
    PaymentFailed { order_id: String, status: String },

    /// The session's order was created for another product
    #[error("Order {order_id} belongs to product {order_product}, not {selected_product}")]
    ProductMismatch {
        order_id: String,
        order_product: String,
        selected_product: String,
    },

    /// Confirm requested without an order in the session
    #[error("No active order in this session")]
    NoActiveOrder,

    /// Download requested before anything was delivered
    #[error("Nothing has been delivered in this session")]
    NotDelivered,

    /// A capture for this session is already outstanding
    #[error("A payment confirmation is already in progress for this session")]
    CaptureInProgress,

    /// Download could not be produced from the file host
    #[error("File retrieval failed for {file_ref}: {message}")]
    FileRetrieval { file_ref: String, message: String },

    /// Session token missing, forged or expired
    #[error("Session error: {0}")]
    Session(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    /// Shorthand for a file-host failure
    pub fn file_retrieval(file_ref: impl Into<String>, message: impl ToString) -> Self {
        ShopError::FileRetrieval {
            file_ref: file_ref.into(),
            message: message.to_string(),
        }
    }

    /// Errors that halt the flow awaiting user action rather than failing it
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ShopError::UnexpectedStatus { .. }
                | ShopError::ProductMismatch { .. }
                | ShopError::CaptureInProgress
                | ShopError::NoActiveOrder
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::Configuration(_) => 500,
            ShopError::InvalidRequest(_) => 400,
            ShopError::ProductNotFound { .. } => 404,
            ShopError::Auth { .. } => 502,
            ShopError::Gateway { .. } => 502,
            ShopError::Network(_) => 503,
            ShopError::UnexpectedStatus { .. } => 409,
            ShopError::InvalidTransition { .. } => 409,
            ShopError::PaymentFailed { .. } => 402,
            ShopError::ProductMismatch { .. } => 409,
            ShopError::NoActiveOrder => 404,
            ShopError::NotDelivered => 404,
            ShopError::CaptureInProgress => 409,
            ShopError::FileRetrieval { .. } => 502,
            ShopError::Session(_) => 401,
            ShopError::Serialization(_) => 500,
            ShopError::Internal(_) => 500,
        }
    }
}

/// Result type alias for storefront operations
pub type ShopResult<T> = Result<T, ShopError>;
