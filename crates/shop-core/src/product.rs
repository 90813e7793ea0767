//! # Product Types
//!
//! Product catalog types for the storefront.
//! Products are loaded from `config/products.toml` at startup and never change afterwards.

use crate::error::{ShopError, ShopResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    MXN,
}

impl Currency {
    /// Returns the ISO 4217 currency code (upper case, as payment gateways expect it)
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
            Currency::CHF => "CHF",
            Currency::MXN => "MXN",
        }
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, most others have 2)
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Convert a decimal amount to the smallest currency unit (cents, etc.)
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        let multiplier = 10_f64.powi(self.decimal_places() as i32);
        (amount * multiplier).round() as i64
    }

    fn unit_multiplier(&self) -> i64 {
        10_i64.pow(self.decimal_places() as u32)
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "JPY" => Ok(Currency::JPY),
            "CAD" => Ok(Currency::CAD),
            "AUD" => Ok(Currency::AUD),
            "CHF" => Ok(Currency::CHF),
            "MXN" => Ok(Currency::MXN),
            other => Err(ShopError::InvalidRequest(format!(
                "Unsupported currency: {}",
                other
            ))),
        }
    }
}

/// Price with amount in smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in smallest currency unit (cents for USD)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Price {
    /// Create a new price from decimal amount
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self {
            amount: currency.to_smallest_unit(amount),
            currency,
        }
    }

    /// Create a price from smallest unit (cents)
    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Decimal string as payment gateways expect it ("20.00", JPY "1000")
    pub fn to_decimal_string(&self) -> String {
        let places = self.currency.decimal_places() as usize;
        if places == 0 {
            return self.amount.to_string();
        }
        let multiplier = self.currency.unit_multiplier();
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        format!(
            "{}{}.{:0width$}",
            sign,
            abs / multiplier as u64,
            abs % multiplier as u64,
            width = places
        )
    }

    /// Parse a gateway decimal string ("20.00", "7", "5.5") without going through floats
    pub fn parse_decimal(value: &str, currency: Currency) -> ShopResult<Self> {
        let invalid = || ShopError::Serialization(format!("Invalid decimal amount: {:?}", value));
        let places = currency.decimal_places() as usize;
        let (whole, fraction) = match value.trim().split_once('.') {
            Some((w, f)) => (w, f),
            None => (value.trim(), ""),
        };
        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
            || fraction.len() > places
        {
            return Err(invalid());
        }
        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction: i64 = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction, width = places);
            padded.parse().map_err(|_| invalid())?
        };
        let amount = whole
            .checked_mul(currency.unit_multiplier())
            .and_then(|a| a.checked_add(fraction))
            .ok_or_else(invalid)?;
        Ok(Self { amount, currency })
    }

    /// Format for display (e.g., "$10.00")
    pub fn display(&self) -> String {
        let symbol = match self.currency {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CAD => "C$",
            Currency::AUD => "A$",
            Currency::CHF => "CHF ",
            Currency::MXN => "MX$",
        };
        format!("{}{}", symbol, self.to_decimal_string())
    }
}

/// A digital product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier (e.g., "xml-key-generator-v4")
    pub id: String,

    /// Display name, also unique across the catalog
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Price
    pub price: Price,

    /// Opaque reference to the downloadable file on the file host
    pub file_ref: String,

    /// Whether this product is active and available for purchase
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Create a new digital product
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Price,
        file_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price,
            file_ref: file_ref.into(),
            active: true,
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: take the product off sale
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    pub products: Vec<Product>,
}

impl ProductCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Builder: add a product
    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }

    /// Find a product by ID
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Find a product that can be bought right now
    pub fn purchasable(&self, id: &str) -> ShopResult<&Product> {
        self.get(id)
            .filter(|p| p.active)
            .ok_or_else(|| ShopError::ProductNotFound {
                product_id: id.to_string(),
            })
    }

    /// Get all active products
    pub fn active_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.active)
    }

    /// Check catalog consistency: unique ids and names, positive prices, file refs present
    pub fn validate(&self) -> ShopResult<()> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for product in &self.products {
            if !ids.insert(product.id.as_str()) {
                return Err(ShopError::Configuration(format!(
                    "Duplicate product id: {}",
                    product.id
                )));
            }
            if !names.insert(product.name.as_str()) {
                return Err(ShopError::Configuration(format!(
                    "Duplicate product name: {}",
                    product.name
                )));
            }
            if product.price.amount <= 0 {
                return Err(ShopError::Configuration(format!(
                    "Product {} must have a positive price",
                    product.id
                )));
            }
            if product.file_ref.trim().is_empty() {
                return Err(ShopError::Configuration(format!(
                    "Product {} has no file reference",
                    product.id
                )));
            }
        }
        Ok(())
    }

    /// Load and validate a catalog from a TOML string
    pub fn from_toml(toml_str: &str) -> ShopResult<Self> {
        let catalog: Self = toml::from_str(toml_str)
            .map_err(|e| ShopError::Configuration(format!("Invalid catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }
}
