//! # Digital Storefront
//!
//! Sells downloadable files: PayPal checkout, Google Drive delivery.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export PAYPAL_CLIENT_ID=...
//! export PAYPAL_SECRET=...
//! export GDRIVE_SERVICE_ACCOUNT_FILE=service-account.json
//!
//! # Run the server
//! storefront
//! ```

use shop_api::{routes, AppConfig, AppState, LogFormat};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }

    let config = AppConfig::from_env()?;
    print_banner(&config.store_name);

    let addr = config.socket_addr()?;
    let is_prod = config.is_production();

    // Initialize application state
    let state = AppState::new(config)?;

    info!("Environment: {}", state.config.environment);
    info!("Products loaded: {}", state.catalog.products.len());
    info!(
        "Payment provider: {}, delivery: {:?}",
        state.flow.provider_name(),
        state.flow.delivery_mode()
    );

    let app = routes::create_router(state);

    info!("Storefront starting on http://{}", addr);

    if !is_prod {
        info!("Products: GET http://{}/api/v1/products", addr);
        info!("Session: POST http://{}/api/v1/sessions", addr);
        info!("Checkout: POST http://{}/api/v1/checkout", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner(store_name: &str) {
    println!(
        r#"
  {}
  ━━━━━━━━━━━━━━━━━━━━━━━
  Digital storefront
  Version: {}

"#,
        store_name,
        env!("CARGO_PKG_VERSION")
    );
}
