//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the checkout flow, session store, configuration, and product catalog.

use crate::session::SessionStore;
use shop_core::{
    BoxedFileHost, BoxedPaymentGateway, CheckoutFlow, CheckoutUrls, DeliveryMode, ProductCatalog,
    ShopError, ShopResult,
};
use shop_drive::DriveClient;
use shop_paypal::PayPalGateway;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` selects JSON lines, anything else the human format
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL for gateway return/cancel redirects
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Store name shown on pages and at the gateway
    pub store_name: String,
    /// HMAC key for session tokens
    pub session_secret: Vec<u8>,
    /// Idle session lifetime
    pub session_ttl: Duration,
    /// Explicit catalog file, otherwise `config/products.toml` is searched
    pub catalog_path: Option<PathBuf>,
    /// How purchased files reach the buyer
    pub delivery_mode: DeliveryMode,
    /// Log output format
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> ShopResult<Self> {
        dotenvy::dotenv().ok();

        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let port = match std::env::var("PORT") {
            Ok(port) => port
                .parse()
                .map_err(|_| ShopError::Configuration(format!("Invalid PORT: {}", port)))?,
            Err(_) => 8080,
        };

        let session_ttl = match std::env::var("SESSION_TTL_SECS") {
            Ok(secs) => Duration::from_secs(secs.parse().map_err(|_| {
                ShopError::Configuration(format!("Invalid SESSION_TTL_SECS: {}", secs))
            })?),
            Err(_) => Duration::from_secs(3600),
        };

        let session_secret =
            session_secret(&environment, std::env::var("SESSION_SECRET").ok())?;

        let delivery_mode = match std::env::var("DELIVERY_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) => DeliveryMode::default(),
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment,
            store_name: std::env::var("STORE_NAME")
                .unwrap_or_else(|_| "Digital Store".to_string()),
            session_secret,
            session_ttl,
            catalog_path: std::env::var("CATALOG_PATH").ok().map(PathBuf::from),
            delivery_mode,
            log_format: LogFormat::from_env(),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> ShopResult<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|_| {
            ShopError::Configuration(format!("Invalid socket address {}:{}", self.host, self.port))
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            store_name: "Digital Store".to_string(),
            session_secret: random_secret(),
            session_ttl: Duration::from_secs(3600),
            catalog_path: None,
            delivery_mode: DeliveryMode::default(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("environment", &self.environment)
            .field("store_name", &self.store_name)
            .field("session_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("catalog_path", &self.catalog_path)
            .field("delivery_mode", &self.delivery_mode)
            .field("log_format", &self.log_format)
            .finish()
    }
}

/// Resolve the session HMAC key; production refuses a missing or short secret
fn session_secret(environment: &str, configured: Option<String>) -> ShopResult<Vec<u8>> {
    let production = environment == "production";

    let secret = match configured.filter(|s| !s.is_empty()) {
        Some(secret) => secret.into_bytes(),
        None if production => {
            return Err(ShopError::Configuration(
                "SESSION_SECRET must be set in production".to_string(),
            ))
        }
        None => {
            tracing::warn!("SESSION_SECRET not set, using a per-process random secret");
            random_secret()
        }
    };

    if production && secret.len() < MIN_PRODUCTION_SECRET_LEN {
        return Err(ShopError::Configuration(format!(
            "SESSION_SECRET must be at least {} bytes in production",
            MIN_PRODUCTION_SECRET_LEN
        )));
    }

    Ok(secret)
}

fn random_secret() -> Vec<u8> {
    let mut secret = uuid::Uuid::new_v4().as_bytes().to_vec();
    secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    secret
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout flow controller
    pub flow: CheckoutFlow,
    /// Buyer sessions
    pub sessions: SessionStore,
    /// Product catalog
    pub catalog: Arc<ProductCatalog>,
    /// Application config
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create the production state: PayPal gateway and Drive file host
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let catalog = load_product_catalog(config.catalog_path.as_deref())?;

        let gateway = PayPalGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize PayPal: {}", e))?;
        let files = DriveClient::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Google Drive: {}", e))?;

        Ok(Self::with_services(
            config,
            catalog,
            Arc::new(gateway),
            Arc::new(files),
        ))
    }

    /// Assemble state around explicit services
    pub fn with_services(
        config: AppConfig,
        catalog: ProductCatalog,
        gateway: BoxedPaymentGateway,
        files: BoxedFileHost,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let flow = CheckoutFlow::new(
            gateway,
            files,
            catalog.clone(),
            CheckoutUrls::new(&config.base_url),
        )
        .with_delivery_mode(config.delivery_mode);
        let sessions = SessionStore::new(config.session_secret.clone(), config.session_ttl);

        Self {
            flow,
            sessions,
            catalog,
            config: Arc::new(config),
        }
    }
}

/// Load product catalog from config file
fn load_product_catalog(path: Option<&Path>) -> anyhow::Result<ProductCatalog> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let catalog = ProductCatalog::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        tracing::info!("Loaded {} products from {}", catalog.products.len(), path.display());
        return Ok(catalog);
    }

    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = ProductCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
            return Ok(catalog);
        }
    }

    // A storefront without products cannot sell anything.
    Err(anyhow::anyhow!(
        "No product catalog found (set CATALOG_PATH or add config/products.toml)"
    ))
}
