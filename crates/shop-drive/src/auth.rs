//! # Service Account Authentication
//!
//! OAuth 2.0 JWT bearer grant: a claim set signed RS256 with the service
//! account key is exchanged at the token endpoint for a bearer token.

use crate::config::DriveConfig;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shop_core::{AccessToken, ShopError, ShopResult};
use tokio::sync::RwLock;
use tracing::{debug, error};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

/// Issues and caches service-account bearer tokens
pub(crate) struct ServiceAccountAuth {
    key: EncodingKey,
    cached: RwLock<Option<AccessToken>>,
}

impl ServiceAccountAuth {
    pub fn new(config: &DriveConfig) -> ShopResult<Self> {
        let key = EncodingKey::from_rsa_pem(config.service_account.private_key.as_bytes())
            .map_err(|e| {
                ShopError::Configuration(format!("Invalid service account private key: {}", e))
            })?;

        Ok(Self {
            key,
            cached: RwLock::new(None),
        })
    }

    /// Sign the JWT assertion for the token endpoint
    pub fn assertion(&self, config: &DriveConfig) -> ShopResult<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: config.service_account.client_email.clone(),
            scope: config.scope.clone(),
            aud: config.service_account.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = config.service_account.private_key_id.clone();

        encode(&header, &claims, &self.key)
            .map_err(|e| ShopError::Internal(format!("Failed to sign assertion: {}", e)))
    }

    /// A live bearer token, fetching a new one when the cached token is stale
    pub async fn token(&self, config: &DriveConfig, client: &Client) -> ShopResult<AccessToken> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.clone());
        }

        let token = self.exchange(config, client).await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Forget the cached token (after the API refused it)
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn exchange(&self, config: &DriveConfig, client: &Client) -> ShopResult<AccessToken> {
        let assertion = self.assertion(config)?;
        let token_uri = &config.service_account.token_uri;
        let auth_error = |message: String| ShopError::Auth {
            provider: "gdrive".to_string(),
            message,
        };

        let response = client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| auth_error(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| auth_error(format!("token response unreadable: {}", e)))?;

        if !status.is_success() {
            error!("Service account token exchange failed: status={}, body={}", status, body);
            return Err(auth_error(format!("token endpoint HTTP {}: {}", status, body)));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| auth_error(format!("invalid token response: {}", e)))?;

        debug!(
            "Service account {} authenticated, token expires in {}s",
            config.service_account.client_email, token.expires_in
        );

        Ok(AccessToken::new(token.access_token, token.expires_in))
    }
}
