//! # PayPal Orders v2
//!
//! Implementation of the PayPal Orders v2 API as a `PaymentGateway`.
//!
//! Requests are single round trips; nothing here retries. The capture call
//! carries a `PayPal-Request-Id` derived from the order id, so a repeated
//! capture of the same order is answered from PayPal's idempotency cache
//! instead of charging twice.

use crate::config::PayPalConfig;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use shop_core::{
    AccessToken, Currency, GatewayOrder, OrderLink, OrderRequest, OrderStatus, PaymentGateway,
    Price, ShopError, ShopResult,
};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const PROVIDER: &str = "paypal";

/// PayPal payment gateway
pub struct PayPalGateway {
    config: PayPalConfig,
    client: Client,
}

impl PayPalGateway {
    /// Create a new PayPal gateway
    pub fn new(config: PayPalConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ShopError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "PayPal gateway using {} ({})",
            config.api_base_url,
            if config.is_sandbox() { "sandbox" } else { "live" }
        );

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        let config = PayPalConfig::from_env()?;
        Self::new(config)
    }

    fn orders_url(&self) -> String {
        format!("{}/v2/checkout/orders", self.config.api_base_url)
    }

    /// Build the Orders v2 create body
    fn build_create_body(&self, request: &OrderRequest) -> CreateOrderBody {
        CreateOrderBody {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnitRequest {
                reference_id: request.reference_id.clone(),
                description: request.description.clone(),
                amount: AmountBody {
                    currency_code: request.amount.currency.code().to_string(),
                    value: request.amount.to_decimal_string(),
                },
            }],
            application_context: ApplicationContext {
                brand_name: self.config.brand_name.clone(),
                return_url: request.return_url.clone(),
                cancel_url: request.cancel_url.clone(),
                shipping_preference: "NO_SHIPPING",
                user_action: "PAY_NOW",
            },
        }
    }

    /// Send a request and return the body of a 2xx answer
    async fn send(&self, request: RequestBuilder) -> ShopResult<String> {
        let response = request
            .send()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("PayPal API error: status={}, body={}", status, body);
            return Err(api_error(status, &body));
        }

        Ok(body)
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    #[instrument(skip(self))]
    async fn acquire_token(&self) -> ShopResult<AccessToken> {
        let url = format!("{}/v1/oauth2/token", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.secret))
            .header("Accept", "application/json")
            .header("Accept-Language", "en_US")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("PayPal token request failed: status={}", status);
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.error, e.error_description.unwrap_or_default()))
                .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));
            return Err(ShopError::Auth {
                provider: PROVIDER.to_string(),
                message,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse PayPal token response: {}", e))
        })?;

        debug!("Acquired PayPal token, expires in {}s", token.expires_in);

        Ok(AccessToken::new(token.access_token, token.expires_in))
    }

    #[instrument(skip(self, token, request), fields(reference_id = %request.reference_id))]
    async fn create_order(
        &self,
        token: &AccessToken,
        request: &OrderRequest,
    ) -> ShopResult<GatewayOrder> {
        let body = self.build_create_body(request);

        debug!(
            "Creating PayPal order: {} {}",
            body.purchase_units[0].amount.value, body.purchase_units[0].amount.currency_code
        );

        let response = self
            .send(
                self.client
                    .post(self.orders_url())
                    .header("Authorization", token.bearer())
                    .header("PayPal-Request-Id", Uuid::new_v4().to_string())
                    .json(&body),
            )
            .await?;

        let mut order = parse_order(&response)?;

        if order.approval_url().is_none() {
            return Err(ShopError::Gateway {
                provider: PROVIDER.to_string(),
                status: StatusCode::OK.as_u16(),
                message: format!("Order {} has no approve link", order.id),
            });
        }

        // Minimal create responses omit purchase units; the amount is what we sent.
        if order.amount.is_none() {
            order.amount = Some(request.amount);
        }

        info!("Created PayPal order: id={}, status={}", order.id, order.status);

        Ok(order)
    }

    #[instrument(skip(self, token))]
    async fn get_order(&self, token: &AccessToken, order_id: &str) -> ShopResult<GatewayOrder> {
        let url = format!("{}/{}", self.orders_url(), order_id);

        let response = self
            .send(
                self.client
                    .get(&url)
                    .header("Authorization", token.bearer()),
            )
            .await?;

        let order = parse_order(&response)?;
        debug!("PayPal order {} is {}", order.id, order.status);
        Ok(order)
    }

    #[instrument(skip(self, token))]
    async fn capture_order(
        &self,
        token: &AccessToken,
        order_id: &str,
    ) -> ShopResult<GatewayOrder> {
        let url = format!("{}/{}/capture", self.orders_url(), order_id);

        let response = self
            .send(
                self.client
                    .post(&url)
                    .header("Authorization", token.bearer())
                    .header("PayPal-Request-Id", format!("capture-{}", order_id))
                    .json(&serde_json::json!({})),
            )
            .await?;

        let order = parse_order(&response)?;
        info!("Captured PayPal order: id={}, status={}", order.id, order.status);
        Ok(order)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Map a non-2xx answer onto the error taxonomy, keeping PayPal's message
fn api_error(status: StatusCode, body: &str) -> ShopError {
    let message = match serde_json::from_str::<PayPalErrorResponse>(body) {
        Ok(err) => {
            let issues: Vec<String> = err
                .details
                .iter()
                .map(|d| match &d.description {
                    Some(desc) => format!("{} ({})", d.issue, desc),
                    None => d.issue.clone(),
                })
                .collect();
            let mut message = format!("{}: {}", err.name, err.message);
            if !issues.is_empty() {
                message.push_str(&format!(" [{}]", issues.join(", ")));
            }
            message
        }
        Err(_) => format!("HTTP {}: {}", status, body),
    };

    if status == StatusCode::UNAUTHORIZED {
        ShopError::Auth {
            provider: PROVIDER.to_string(),
            message,
        }
    } else {
        ShopError::Gateway {
            provider: PROVIDER.to_string(),
            status: status.as_u16(),
            message,
        }
    }
}

/// Parse an Orders v2 order body
fn parse_order(body: &str) -> ShopResult<GatewayOrder> {
    let order: OrderResponse = serde_json::from_str(body).map_err(|e| {
        ShopError::Serialization(format!("Failed to parse PayPal order: {}", e))
    })?;

    let status = OrderStatus::from_remote(&order.id, &order.status)?;

    let amount = match order.purchase_units.first().and_then(|u| u.amount.as_ref()) {
        Some(amount) => {
            let currency: Currency = amount.currency_code.parse()?;
            Some(Price::parse_decimal(&amount.value, currency)?)
        }
        None => None,
    };

    Ok(GatewayOrder {
        id: order.id,
        status,
        amount,
        links: order
            .links
            .into_iter()
            .map(|l| OrderLink {
                rel: l.rel,
                href: l.href,
            })
            .collect(),
    })
}

// =============================================================================
// PayPal API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateOrderBody {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnitRequest>,
    application_context: ApplicationContext,
}

#[derive(Debug, Serialize)]
struct PurchaseUnitRequest {
    reference_id: String,
    description: String,
    amount: AmountBody,
}

#[derive(Debug, Serialize, Deserialize)]
struct AmountBody {
    currency_code: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ApplicationContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    brand_name: Option<String>,
    return_url: String,
    cancel_url: String,
    shipping_preference: &'static str,
    user_action: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnitResponse>,
    #[serde(default)]
    links: Vec<LinkResponse>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnitResponse {
    #[serde(default)]
    amount: Option<AmountBody>,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PayPalErrorResponse {
    name: String,
    message: String,
    #[serde(default)]
    details: Vec<PayPalErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct PayPalErrorDetail {
    issue: String,
    #[serde(default)]
    description: Option<String>,
}
