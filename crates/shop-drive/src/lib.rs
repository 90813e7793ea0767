//! # shop-drive
//!
//! Google Drive file host for purchase delivery.
//!
//! Authenticates as a service account (RS256-signed JWT exchanged for a
//! bearer token) and reads files through the Drive v3 API.
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_drive::DriveClient;
//! use shop_core::FileHost;
//!
//! let drive = DriveClient::from_env()?;
//! let meta = drive.fetch_metadata("1SRI05oRIFGW6eKbpNiNVuuaLHSvKM4l1").await?;
//! ```

mod auth;
pub mod client;
pub mod config;

pub use client::{public_download_url, DriveClient};
pub use config::{DriveConfig, ServiceAccountKey, DRIVE_READONLY_SCOPE};
