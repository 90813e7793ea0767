//! # shop-api
//!
//! HTTP API layer for the digital storefront.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for the catalog, buyer sessions and checkout
//! - Signed, expiring buyer sessions
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/products` | List products |
//! | GET | `/api/v1/products/{id}` | Get product |
//! | POST | `/api/v1/sessions` | Open session |
//! | GET | `/api/v1/session` | Session state |
//! | DELETE | `/api/v1/session` | End session |
//! | POST | `/api/v1/checkout` | Pay |
//! | POST | `/api/v1/checkout/confirm` | Confirm and deliver |
//! | GET | `/api/v1/download` | Download delivered file |

pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;

pub use routes::create_router;
pub use session::{BuyerSession, SessionHandle, SessionStore, SESSION_HEADER};
pub use state::{AppConfig, AppState, LogFormat};
