//! # Request Handlers
//!
//! Axum request handlers for the storefront API.
//! Every checkout handler resolves the buyer's session from the
//! `X-Session-Token` header before touching the flow.

use crate::session::{SessionHandle, SESSION_HEADER};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shop_core::{
    ConfirmOutcome, Delivery, PendingApproval, Price, Product, SessionView, ShopError,
};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Pay and confirm request
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Selected product
    pub product_id: String,
}

/// Product as shown in the selector
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Price,
    /// Price formatted for display (e.g. "$5.00")
    pub display_price: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            display_price: product.price.display(),
        }
    }
}

/// Open session response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_token: String,
    pub expires_in_secs: u64,
}

/// Confirm response
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmResponse {
    /// Buyer still has to approve at the gateway
    Pending {
        order_id: String,
        approval_url: String,
        message: String,
    },
    /// Paid and ready to download
    Delivered {
        delivery: Delivery,
        download_url: String,
    },
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn shop_error_to_response(err: ShopError) -> ApiError {
    let code = err.status_code();

    if err.is_warning() {
        warn!("{}", err);
    } else if code >= 500 {
        error!("{}", err);
    } else {
        info!("Request rejected: {}", err);
    }

    let mut response = ErrorResponse::new(err.to_string(), code);
    if let ShopError::PaymentFailed { .. } = err {
        response = response.with_details("The payment was not completed. No file was delivered.");
    }
    if let ShopError::FileRetrieval { .. } = err {
        response = response.with_details(
            "Your payment is recorded. Confirm again to retry the download.",
        );
    }

    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// Resolve the caller's session from the token header
async fn session(state: &AppState, headers: &HeaderMap) -> Result<SessionHandle, ApiError> {
    let token = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            shop_error_to_response(ShopError::Session(
                "Missing X-Session-Token header".to_string(),
            ))
        })?;

    state.sessions.get(token).await.map_err(shop_error_to_response)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Product selector: active products with display prices
pub async fn list_products(State(state): State<AppState>) -> impl IntoResponse {
    let products: Vec<ProductView> = state.catalog.active_products().map(Into::into).collect();
    Json(serde_json::json!({
        "store": state.config.store_name,
        "products": products,
        "count": products.len()
    }))
}

/// Get single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<ProductView>, ApiError> {
    let product = state
        .catalog
        .purchasable(&product_id)
        .map_err(shop_error_to_response)?;

    Ok(Json(product.into()))
}

/// Open a buyer session
pub async fn open_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session_token = state.sessions.open().await.map_err(shop_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_token,
            expires_in_secs: state.config.session_ttl.as_secs(),
        }),
    ))
}

/// Current order and delivery of the session
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionView>, ApiError> {
    let handle = session(&state, &headers).await?;
    let view = handle.lock().await.view();
    Ok(Json(view))
}

/// End the session and drop its state
pub async fn end_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let handle = session(&state, &headers).await?;
    handle.lock().await.clear();

    if let Some(token) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        state.sessions.end(token).await.map_err(shop_error_to_response)?;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Pay: create a gateway order for the selected product
#[instrument(skip(state, headers, request), fields(product_id = %request.product_id))]
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<PendingApproval>), ApiError> {
    let handle = session(&state, &headers).await?;
    let mut session = handle.lock().await;

    let pending = state
        .flow
        .begin(&mut session, &request.product_id)
        .await
        .map_err(shop_error_to_response)?;

    info!("Checkout started: order={}", pending.order_id);

    Ok((StatusCode::CREATED, Json(pending)))
}

/// Confirm: capture the approved order and deliver the file.
///
/// Only one confirm per session runs at a time; a second one is refused
/// instead of queued behind the capture. Other requests holding the session
/// state only delay it.
#[instrument(skip(state, headers, request), fields(product_id = %request.product_id))]
pub async fn confirm_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ConfirmResponse>), ApiError> {
    let handle = session(&state, &headers).await?;
    let _confirming = handle.claim_confirm().map_err(shop_error_to_response)?;
    let mut session = handle.lock().await;

    let outcome = state
        .flow
        .confirm(&mut session, &request.product_id)
        .await
        .map_err(shop_error_to_response)?;

    Ok(match outcome {
        ConfirmOutcome::Pending {
            order_id,
            approval_url,
        } => (
            StatusCode::ACCEPTED,
            Json(ConfirmResponse::Pending {
                order_id,
                approval_url,
                message: "Payment not yet approved. Complete the payment at the approval link, then confirm again.".to_string(),
            }),
        ),
        ConfirmOutcome::Delivered(delivery) => (
            StatusCode::OK,
            Json(ConfirmResponse::Delivered {
                delivery,
                download_url: "/api/v1/download".to_string(),
            }),
        ),
    })
}

/// Download the delivered file: redirect to the host link or stream the buffered bytes
#[instrument(skip(state, headers))]
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let handle = session(&state, &headers).await?;
    let session = handle.lock().await;
    let delivery = state
        .flow
        .redeliver(&session)
        .map_err(shop_error_to_response)?;

    match delivery {
        Delivery::Link { url, .. } => Ok(Redirect::to(url).into_response()),
        Delivery::Content {
            file_name,
            mime_type,
            bytes,
            sha256,
            ..
        } => {
            let content_type = HeaderValue::from_str(mime_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            let disposition = HeaderValue::from_str(&format!(
                "attachment; filename=\"{}\"",
                file_name.replace('"', "")
            ))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
            let digest = HeaderValue::from_str(sha256)
                .map_err(|e| shop_error_to_response(ShopError::Internal(e.to_string())))?;

            Ok((
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                    (header::HeaderName::from_static("x-content-sha256"), digest),
                ],
                bytes.clone(),
            )
                .into_response())
        }
    }
}

/// Gateway return page (buyer approved)
pub async fn checkout_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let order_id = params.get("token").map(|s| s.as_str()).unwrap_or("unknown");
    Html(page(
        &state.config.store_name,
        "✅",
        "Payment Approved",
        &format!(
            "Order <code>{}</code> is approved. Return to the store and confirm to receive your download.",
            html_escape(order_id)
        ),
    ))
}

/// Gateway cancel page
pub async fn checkout_cancel(State(state): State<AppState>) -> impl IntoResponse {
    Html(page(
        &state.config.store_name,
        "❌",
        "Payment Cancelled",
        "No charges were made.",
    ))
}

fn page(store: &str, icon: &str, title: &str, body: &str) -> String {
    format!(
        r#"
<!DOCTYPE html>
<html>
<head><title>{title} - {store}</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: linear-gradient(135deg, #1a1a2e 0%, #16213e 100%);">
    <div style="background: white; padding: 60px; border-radius: 16px; text-align: center;">
        <div style="font-size: 60px;">{icon}</div>
        <h1>{title}</h1>
        <p style="color: #666;">{body}</p>
        <p style="color: #999;">{store}</p>
    </div>
</body>
</html>
"#,
        title = title,
        store = html_escape(store),
        icon = icon,
        body = body,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400);
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
    }

    #[test]
    fn test_shop_error_conversion() {
        let (status, _json) = shop_error_to_response(ShopError::InvalidRequest("Bad data".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _json) = shop_error_to_response(ShopError::CaptureInProgress);
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, Json(body)) = shop_error_to_response(ShopError::file_retrieval("f", "HTTP 503"));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.details.is_some());
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>\"x\"&"), "&lt;b&gt;&quot;x&quot;&amp;");
    }
}
