//! # Delivery Types
//!
//! What the buyer receives once an order is paid.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

use crate::error::ShopError;

/// How purchased files reach the buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Hand out the file host's own download link
    Link,
    /// Fetch the content and serve it from the storefront
    Proxy,
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::Link
    }
}

impl FromStr for DeliveryMode {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "link" => Ok(DeliveryMode::Link),
            "proxy" => Ok(DeliveryMode::Proxy),
            other => Err(ShopError::Configuration(format!(
                "DELIVERY_MODE must be 'link' or 'proxy', got '{}'",
                other
            ))),
        }
    }
}

/// File metadata from the file host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub mime_type: String,
    /// Host-provided download link, when the host exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_content_link: Option<String>,
}

/// A completed delivery, kept in the session for re-download
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
    /// Buyer downloads straight from the file host
    Link {
        order_id: String,
        product_id: String,
        file_name: String,
        mime_type: String,
        url: String,
    },
    /// Content buffered by the storefront
    Content {
        order_id: String,
        product_id: String,
        file_name: String,
        mime_type: String,
        #[serde(skip)]
        bytes: Vec<u8>,
        size: usize,
        sha256: String,
    },
}

impl Delivery {
    /// Build a buffered delivery, computing its size and digest
    pub fn content(
        order_id: impl Into<String>,
        product_id: impl Into<String>,
        metadata: FileMetadata,
        bytes: Vec<u8>,
    ) -> Self {
        let sha256 = hex::encode(Sha256::digest(&bytes));
        Delivery::Content {
            order_id: order_id.into(),
            product_id: product_id.into(),
            file_name: metadata.name,
            mime_type: metadata.mime_type,
            size: bytes.len(),
            bytes,
            sha256,
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            Delivery::Link { order_id, .. } | Delivery::Content { order_id, .. } => order_id,
        }
    }

    pub fn product_id(&self) -> &str {
        match self {
            Delivery::Link { product_id, .. } | Delivery::Content { product_id, .. } => product_id,
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            Delivery::Link { file_name, .. } | Delivery::Content { file_name, .. } => file_name,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Delivery::Link { mime_type, .. } | Delivery::Content { mime_type, .. } => mime_type,
        }
    }
}
