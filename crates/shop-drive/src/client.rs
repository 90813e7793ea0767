//! # Drive v3 Client
//!
//! `FileHost` backed by the Drive v3 files API. Every failure, including a
//! failed token exchange, surfaces as `ShopError::FileRetrieval` naming the
//! file reference.

use crate::auth::ServiceAccountAuth;
use crate::config::DriveConfig;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use shop_core::{FileHost, FileMetadata, ShopError, ShopResult};
use tracing::{debug, error, instrument, warn};

const HOST: &str = "gdrive";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default = "default_mime_type")]
    mime_type: String,
    #[serde(default)]
    web_content_link: Option<String>,
}

fn default_mime_type() -> String {
    "application/octet-stream".to_string()
}

/// Public download URL for a file shared by link
pub fn public_download_url(file_ref: &str) -> String {
    format!("https://drive.google.com/uc?export=download&id={}", file_ref)
}

/// Drive file host
pub struct DriveClient {
    config: DriveConfig,
    client: Client,
    auth: ServiceAccountAuth,
}

impl DriveClient {
    /// Create a new Drive client
    pub fn new(config: DriveConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ShopError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        let auth = ServiceAccountAuth::new(&config)?;

        Ok(Self {
            config,
            client,
            auth,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        Self::new(DriveConfig::from_env()?)
    }

    fn file_url(&self, file_ref: &str) -> String {
        format!("{}/drive/v3/files/{}", self.config.api_base_url, file_ref)
    }

    /// Authorized GET on a file resource; returns the 2xx response
    async fn get(&self, file_ref: &str, query: &[(&str, &str)]) -> ShopResult<Response> {
        let token = self
            .auth
            .token(&self.config, &self.client)
            .await
            .map_err(|e| ShopError::file_retrieval(file_ref, e.to_string()))?;

        let response = self
            .client
            .get(self.file_url(file_ref))
            .bearer_auth(&token.value)
            .query(query)
            .send()
            .await
            .map_err(|e| ShopError::file_retrieval(file_ref, format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("Drive rejected the cached token, it will be refreshed");
            self.auth.invalidate().await;
        }

        let body = response.text().await.unwrap_or_default();
        error!("Drive API error: file={}, status={}, body={}", file_ref, status, body);
        Err(ShopError::file_retrieval(
            file_ref,
            format!("HTTP {}: {}", status.as_u16(), api_message(&body)),
        ))
    }
}

#[async_trait]
impl FileHost for DriveClient {
    #[instrument(skip(self))]
    async fn fetch_metadata(&self, file_ref: &str) -> ShopResult<FileMetadata> {
        let response = self
            .get(
                file_ref,
                &[
                    ("fields", "name,mimeType,webContentLink"),
                    ("supportsAllDrives", "true"),
                ],
            )
            .await?;

        let file: FileResource = response
            .json()
            .await
            .map_err(|e| ShopError::file_retrieval(file_ref, format!("invalid metadata: {}", e)))?;

        debug!("Drive metadata: name={}, mime_type={}", file.name, file.mime_type);

        Ok(FileMetadata {
            name: file.name,
            mime_type: file.mime_type,
            web_content_link: file.web_content_link,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_content(&self, file_ref: &str) -> ShopResult<Vec<u8>> {
        let response = self
            .get(file_ref, &[("alt", "media"), ("supportsAllDrives", "true")])
            .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ShopError::file_retrieval(file_ref, format!("download interrupted: {}", e)))?;

        if bytes.is_empty() {
            return Err(ShopError::file_retrieval(file_ref, "file is empty"));
        }

        debug!("Drive content fetched: {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self, metadata))]
    async fn generate_link(&self, file_ref: &str, metadata: &FileMetadata) -> ShopResult<String> {
        Ok(metadata
            .web_content_link
            .clone()
            .unwrap_or_else(|| public_download_url(file_ref)))
    }

    fn host_name(&self) -> &'static str {
        HOST
    }
}

/// Pull `error.message` out of a Drive error body, falling back to the raw body
fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}
