//! # Checkout Flow
//!
//! Sequences catalog, payment gateway and file host into the purchase lifecycle:
//!
//! 1. `begin` creates a gateway order for the selected product and remembers it
//!    in the session together with the buyer's approval link.
//! 2. The buyer approves at the gateway (outside this system).
//! 3. `confirm` re-probes the order at the gateway and branches on its status:
//!    - `APPROVED` → capture, then deliver on `COMPLETED`
//!    - `CREATED` → still pending, nothing changes
//!    - `COMPLETED` → deliver again without capturing
//!    - `FAILED` → payment failure, no retry
//!
//! A capture is never attempted for an order whose product differs from the
//! currently selected one. Callers serialise `confirm` per session.

use crate::delivery::{Delivery, DeliveryMode};
use crate::error::{ShopError, ShopResult};
use crate::order::{AccessToken, Order, OrderRequest, OrderStatus};
use crate::product::{Price, Product, ProductCatalog};
use crate::session::OrderSession;
use crate::strategy::{BoxedFileHost, BoxedPaymentGateway, CheckoutUrls};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Result of `begin`: what the buyer needs to approve the payment
#[derive(Debug, Clone, Serialize)]
pub struct PendingApproval {
    pub order_id: String,
    pub product_id: String,
    pub status: OrderStatus,
    pub amount: Price,
    pub approval_url: String,
}

/// Result of `confirm`
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// The buyer has not approved yet
    Pending {
        order_id: String,
        approval_url: String,
    },
    /// Payment captured and file delivered
    Delivered(Delivery),
}

/// Checkout flow controller
#[derive(Clone)]
pub struct CheckoutFlow {
    gateway: BoxedPaymentGateway,
    files: BoxedFileHost,
    catalog: Arc<ProductCatalog>,
    urls: CheckoutUrls,
    delivery_mode: DeliveryMode,
}

impl CheckoutFlow {
    pub fn new(
        gateway: BoxedPaymentGateway,
        files: BoxedFileHost,
        catalog: Arc<ProductCatalog>,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            gateway,
            files,
            catalog,
            urls,
            delivery_mode: DeliveryMode::default(),
        }
    }

    /// Builder: choose how files reach the buyer
    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    pub fn provider_name(&self) -> &'static str {
        self.gateway.provider_name()
    }

    /// Reuse the session's gateway token or acquire a new one
    async fn token(&self, session: &mut OrderSession) -> ShopResult<AccessToken> {
        if let Some(token) = session.live_token() {
            return Ok(token.clone());
        }
        debug!("Acquiring {} access token", self.gateway.provider_name());
        let token = self.gateway.acquire_token().await?;
        session.store_token(token.clone());
        Ok(token)
    }

    /// Drop a token the gateway refused so the next call starts clean
    fn on_gateway_error(session: &mut OrderSession, err: ShopError) -> ShopError {
        if matches!(err, ShopError::Auth { .. }) {
            session.forget_token();
        }
        err
    }

    /// Create a gateway order for `product_id` and remember it in the session.
    ///
    /// Nothing is stored when any step fails.
    #[instrument(skip(self, session), fields(provider = self.gateway.provider_name()))]
    pub async fn begin(
        &self,
        session: &mut OrderSession,
        product_id: &str,
    ) -> ShopResult<PendingApproval> {
        let product = self.catalog.purchasable(product_id)?;

        if let Some(paid) = session.order().filter(|_| session.has_undelivered_payment()) {
            return Err(ShopError::InvalidRequest(format!(
                "Order {} is paid but not delivered yet; confirm it to retry the download",
                paid.id
            )));
        }

        let token = self.token(session).await?;
        let request =
            OrderRequest::for_product(product, &self.urls.return_url(), &self.urls.cancel_url());

        let created = match self.gateway.create_order(&token, &request).await {
            Ok(created) => created,
            Err(e) => return Err(Self::on_gateway_error(session, e)),
        };

        if let Some(amount) = created.amount {
            if amount != product.price {
                return Err(ShopError::Gateway {
                    provider: self.gateway.provider_name().to_string(),
                    status: 200,
                    message: format!(
                        "Order {} was created for {} instead of {}",
                        created.id,
                        amount.display(),
                        product.price.display()
                    ),
                });
            }
        }

        if created.status.is_terminal() {
            return Err(ShopError::UnexpectedStatus {
                order_id: created.id,
                status: created.status.to_string(),
            });
        }

        let order = Order::from_gateway(self.gateway.provider_name(), product, &created)?;
        let pending = PendingApproval {
            order_id: order.id.clone(),
            product_id: order.product_id.clone(),
            status: order.status,
            amount: order.amount,
            approval_url: order.approval_url.clone(),
        };

        if let Some(abandoned) = session.start_order(order) {
            info!(
                "Abandoning order {} ({}) in favour of {}",
                abandoned.id, abandoned.status, pending.order_id
            );
        }

        info!(
            "Created order {} for {} ({})",
            pending.order_id,
            product.name,
            pending.amount.display()
        );

        Ok(pending)
    }

    /// Probe the session's order and capture/deliver when the buyer approved it.
    #[instrument(skip(self, session), fields(provider = self.gateway.provider_name()))]
    pub async fn confirm(
        &self,
        session: &mut OrderSession,
        selected_product: &str,
    ) -> ShopResult<ConfirmOutcome> {
        let order = match session.order() {
            Some(order) => order.clone(),
            None => {
                // Already delivered: hand back the same delivery, no gateway calls.
                return match session.delivery() {
                    Some(delivery) if delivery.product_id() == selected_product => {
                        info!("Order {} already delivered", delivery.order_id());
                        Ok(ConfirmOutcome::Delivered(delivery.clone()))
                    }
                    _ => Err(ShopError::NoActiveOrder),
                };
            }
        };

        order.ensure_product(selected_product)?;

        let token = self.token(session).await?;
        let remote = match self.gateway.get_order(&token, &order.id).await {
            Ok(remote) => remote,
            Err(e) => return Err(Self::on_gateway_error(session, e)),
        };
        let status = self.observe(session, remote.status)?;
        debug!("Order {} is {}", order.id, status);

        match status {
            OrderStatus::Created => {
                info!("Order {} is awaiting buyer approval", order.id);
                Ok(ConfirmOutcome::Pending {
                    order_id: order.id,
                    approval_url: order.approval_url,
                })
            }
            OrderStatus::Approved => {
                let captured = match self.gateway.capture_order(&token, &order.id).await {
                    Ok(captured) => captured,
                    Err(e) => return Err(Self::on_gateway_error(session, e)),
                };
                match self.observe(session, captured.status)? {
                    OrderStatus::Completed => {
                        info!("Captured order {}", order.id);
                        self.deliver(session, &order).await.map(ConfirmOutcome::Delivered)
                    }
                    OrderStatus::Failed => Err(self.fail(session, &order)),
                    other => {
                        warn!("Capture of order {} returned {}", order.id, other);
                        Err(ShopError::UnexpectedStatus {
                            order_id: order.id,
                            status: other.to_string(),
                        })
                    }
                }
            }
            OrderStatus::Completed => {
                info!("Order {} already captured, delivering again", order.id);
                self.deliver(session, &order).await.map(ConfirmOutcome::Delivered)
            }
            OrderStatus::Failed => Err(self.fail(session, &order)),
        }
    }

    /// The last delivery of this session (download endpoint)
    pub fn redeliver<'a>(&self, session: &'a OrderSession) -> ShopResult<&'a Delivery> {
        session.delivery().ok_or(ShopError::NotDelivered)
    }

    fn observe(&self, session: &mut OrderSession, status: OrderStatus) -> ShopResult<OrderStatus> {
        match session.order_mut() {
            Some(order) => order.observe(status),
            None => Err(ShopError::NoActiveOrder),
        }
    }

    fn fail(&self, session: &mut OrderSession, order: &Order) -> ShopError {
        session.clear_order();
        warn!("Payment for order {} failed at the gateway", order.id);
        ShopError::PaymentFailed {
            order_id: order.id.clone(),
            status: OrderStatus::Failed.to_string(),
        }
    }

    /// Deliver a captured order. On failure the order stays in the session as
    /// paid-but-undelivered so the next confirm retries delivery only.
    async fn deliver(&self, session: &mut OrderSession, order: &Order) -> ShopResult<Delivery> {
        let product = self.catalog.get(&order.product_id).ok_or_else(|| {
            ShopError::Internal(format!(
                "Product {} of order {} left the catalog",
                order.product_id, order.id
            ))
        })?;

        match self.fetch_delivery(order, product).await {
            Ok(delivery) => {
                info!(
                    "Delivered {} for order {} via {}",
                    delivery.file_name(),
                    order.id,
                    self.files.host_name()
                );
                session.complete(delivery.clone());
                Ok(delivery)
            }
            Err(e) => {
                error!(
                    order_id = %order.id,
                    product_id = %product.id,
                    file_ref = %product.file_ref,
                    "Payment captured but delivery failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    async fn fetch_delivery(&self, order: &Order, product: &Product) -> ShopResult<Delivery> {
        let metadata = self.files.fetch_metadata(&product.file_ref).await?;

        match self.delivery_mode {
            DeliveryMode::Link => {
                let url = self.files.generate_link(&product.file_ref, &metadata).await?;
                Ok(Delivery::Link {
                    order_id: order.id.clone(),
                    product_id: product.id.clone(),
                    file_name: metadata.name,
                    mime_type: metadata.mime_type,
                    url,
                })
            }
            DeliveryMode::Proxy => {
                let bytes = self.files.fetch_content(&product.file_ref).await?;
                if bytes.is_empty() {
                    return Err(ShopError::file_retrieval(&product.file_ref, "empty content"));
                }
                Ok(Delivery::content(&order.id, &product.id, metadata, bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::FileMetadata;
    use crate::order::{GatewayOrder, OrderLink};
    use crate::product::Currency;
    use crate::strategy::{FileHost, PaymentGateway};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const XML_TOOL: &str = "xml-key-generator-v4";
    const BULK_TOOL: &str = "bulk-xml-generator-v1";

    /// Gateway whose remote status is set by the test
    struct FakeGateway {
        remote_status: Mutex<Result<OrderStatus, String>>,
        capture_result: Mutex<OrderStatus>,
        reject_create: AtomicBool,
        reject_lookup: AtomicBool,
        echoed_amount: Mutex<Option<Price>>,
        next_id: AtomicUsize,
        token_calls: AtomicUsize,
        capture_calls: AtomicUsize,
        get_calls: AtomicUsize,
    }

    impl FakeGateway {
        fn new() -> Self {
            Self {
                remote_status: Mutex::new(Ok(OrderStatus::Created)),
                capture_result: Mutex::new(OrderStatus::Completed),
                reject_create: AtomicBool::new(false),
                reject_lookup: AtomicBool::new(false),
                echoed_amount: Mutex::new(None),
                next_id: AtomicUsize::new(1),
                token_calls: AtomicUsize::new(0),
                capture_calls: AtomicUsize::new(0),
                get_calls: AtomicUsize::new(0),
            }
        }

        fn set_remote(&self, status: OrderStatus) {
            *self.remote_status.lock().unwrap() = Ok(status);
        }

        fn set_remote_raw(&self, status: &str) {
            *self.remote_status.lock().unwrap() = Err(status.to_string());
        }

        fn order(&self, id: &str, status: OrderStatus, amount: Option<Price>) -> GatewayOrder {
            GatewayOrder {
                id: id.to_string(),
                status,
                amount,
                links: vec![OrderLink {
                    rel: "approve".into(),
                    href: format!("https://gateway.test/checkoutnow?token={}", id),
                }],
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn acquire_token(&self) -> ShopResult<AccessToken> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken::new("tok", 3600))
        }

        async fn create_order(
            &self,
            _token: &AccessToken,
            request: &OrderRequest,
        ) -> ShopResult<GatewayOrder> {
            if self.reject_create.load(Ordering::SeqCst) {
                return Err(ShopError::Auth {
                    provider: "fake".into(),
                    message: "HTTP 401".into(),
                });
            }
            let id = format!("O{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let amount = self.echoed_amount.lock().unwrap().unwrap_or(request.amount);
            Ok(self.order(&id, OrderStatus::Created, Some(amount)))
        }

        async fn get_order(&self, _token: &AccessToken, order_id: &str) -> ShopResult<GatewayOrder> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            if self.reject_lookup.load(Ordering::SeqCst) {
                return Err(ShopError::Auth {
                    provider: "fake".into(),
                    message: "HTTP 401".into(),
                });
            }
            let status = match &*self.remote_status.lock().unwrap() {
                Ok(status) => *status,
                Err(raw) => OrderStatus::from_remote(order_id, raw)?,
            };
            Ok(self.order(order_id, status, None))
        }

        async fn capture_order(
            &self,
            _token: &AccessToken,
            order_id: &str,
        ) -> ShopResult<GatewayOrder> {
            self.capture_calls.fetch_add(1, Ordering::SeqCst);
            let status = *self.capture_result.lock().unwrap();
            self.set_remote(status);
            Ok(self.order(order_id, status, None))
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    struct FakeFiles {
        broken: AtomicBool,
        content: Vec<u8>,
        metadata_calls: AtomicUsize,
    }

    #[async_trait]
    impl FileHost for FakeFiles {
        async fn fetch_metadata(&self, file_ref: &str) -> ShopResult<FileMetadata> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            if self.broken.load(Ordering::SeqCst) {
                return Err(ShopError::file_retrieval(file_ref, "HTTP 503"));
            }
            Ok(FileMetadata {
                name: format!("{}.zip", file_ref),
                mime_type: "application/zip".into(),
                web_content_link: None,
            })
        }

        async fn fetch_content(&self, _file_ref: &str) -> ShopResult<Vec<u8>> {
            Ok(self.content.clone())
        }

        async fn generate_link(
            &self,
            file_ref: &str,
            _metadata: &FileMetadata,
        ) -> ShopResult<String> {
            Ok(format!("https://files.test/{}", file_ref))
        }

        fn host_name(&self) -> &'static str {
            "fake-files"
        }
    }

    fn catalog() -> Arc<ProductCatalog> {
        Arc::new(
            ProductCatalog::new()
                .with_product(Product::new(
                    XML_TOOL,
                    "XML Key Generator Tool v4.0",
                    Price::new(20.0, Currency::USD),
                    "file-xml",
                ))
                .with_product(Product::new(
                    BULK_TOOL,
                    "Bulk XML File Generator v1.0",
                    Price::new(7.0, Currency::EUR),
                    "file-bulk",
                )),
        )
    }

    fn flow_with(gateway: Arc<FakeGateway>, files: Arc<FakeFiles>) -> CheckoutFlow {
        CheckoutFlow::new(
            gateway,
            files,
            catalog(),
            CheckoutUrls::new("https://store.test"),
        )
    }

    fn files() -> Arc<FakeFiles> {
        Arc::new(FakeFiles {
            broken: AtomicBool::new(false),
            content: b"PK\x03\x04 tool".to_vec(),
            metadata_calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_order_amount_matches_product_price() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway, files());

        for product in flow.catalog().products.clone() {
            let mut session = OrderSession::new();
            let pending = flow.begin(&mut session, &product.id).await.unwrap();

            assert_eq!(pending.amount, product.price);
            assert_eq!(session.order().unwrap().amount, product.price);
            assert_eq!(session.order().unwrap().product_id, product.id);
        }
    }

    #[tokio::test]
    async fn test_full_purchase_with_content_proxy() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway.clone(), files()).with_delivery_mode(DeliveryMode::Proxy);
        let mut session = OrderSession::new();

        let pending = flow.begin(&mut session, XML_TOOL).await.unwrap();
        assert_eq!(pending.order_id, "O1");
        assert_eq!(pending.status, OrderStatus::Created);
        assert_eq!(pending.amount.to_decimal_string(), "20.00");
        assert!(pending.approval_url.contains("O1"));

        gateway.set_remote(OrderStatus::Approved);
        let outcome = flow.confirm(&mut session, XML_TOOL).await.unwrap();

        match outcome {
            ConfirmOutcome::Delivered(Delivery::Content {
                file_name,
                mime_type,
                bytes,
                ..
            }) => {
                assert_eq!(file_name, "file-xml.zip");
                assert_eq!(mime_type, "application/zip");
                assert!(!bytes.is_empty());
            }
            other => panic!("expected content delivery, got {:?}", other),
        }

        assert_eq!(gateway.capture_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.token_calls.load(Ordering::SeqCst), 1);
        assert!(session.order().is_none());
        assert!(flow.redeliver(&session).is_ok());
    }

    #[tokio::test]
    async fn test_link_delivery() {
        let gateway = Arc::new(FakeGateway::new());
        let files = files();
        let flow = flow_with(gateway.clone(), files.clone());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        gateway.set_remote(OrderStatus::Approved);

        match flow.confirm(&mut session, XML_TOOL).await.unwrap() {
            ConfirmOutcome::Delivered(Delivery::Link { url, .. }) => {
                assert_eq!(url, "https://files.test/file-xml");
            }
            other => panic!("expected link delivery, got {:?}", other),
        }
        assert_eq!(files.metadata_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mispriced_order_is_not_stored() {
        let gateway = Arc::new(FakeGateway::new());
        *gateway.echoed_amount.lock().unwrap() = Some(Price::new(0.01, Currency::USD));
        let flow = flow_with(gateway, files());
        let mut session = OrderSession::new();

        let err = flow.begin(&mut session, XML_TOOL).await.unwrap_err();

        match err {
            ShopError::Gateway {
                provider, message, ..
            } => {
                assert_eq!(provider, "fake");
                assert!(message.contains("O1"));
            }
            other => panic!("expected gateway error, got {:?}", other),
        }
        assert!(session.order().is_none());
    }

    #[tokio::test]
    async fn test_refused_token_is_dropped_on_confirm() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway.clone(), files());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        assert!(session.live_token().is_some());
        gateway.reject_lookup.store(true, Ordering::SeqCst);

        let err = flow.confirm(&mut session, XML_TOOL).await.unwrap_err();

        assert!(matches!(err, ShopError::Auth { .. }));
        assert!(session.live_token().is_none());
        assert!(session.order().is_some());
        assert_eq!(gateway.token_calls.load(Ordering::SeqCst), 1);

        gateway.reject_lookup.store(false, Ordering::SeqCst);
        let outcome = flow.confirm(&mut session, XML_TOOL).await.unwrap();

        assert!(matches!(outcome, ConfirmOutcome::Pending { .. }));
        assert_eq!(gateway.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_create_stores_nothing() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.reject_create.store(true, Ordering::SeqCst);
        let flow = flow_with(gateway, files());
        let mut session = OrderSession::new();

        let err = flow.begin(&mut session, XML_TOOL).await.unwrap_err();

        assert!(matches!(err, ShopError::Auth { .. }));
        assert!(session.order().is_none());
        assert!(session.live_token().is_none());
    }

    #[tokio::test]
    async fn test_pending_approval_does_not_capture() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway.clone(), files());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        let before = session.order().unwrap().clone();

        let outcome = flow.confirm(&mut session, XML_TOOL).await.unwrap();

        assert!(matches!(outcome, ConfirmOutcome::Pending { ref order_id, .. } if order_id == "O1"));
        assert_eq!(gateway.capture_calls.load(Ordering::SeqCst), 0);
        let after = session.order().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.status, OrderStatus::Created);
        assert!(session.delivery().is_none());
    }

    #[tokio::test]
    async fn test_product_mismatch_is_rejected() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway.clone(), files());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        gateway.set_remote(OrderStatus::Approved);

        let err = flow.confirm(&mut session, BULK_TOOL).await.unwrap_err();

        assert!(matches!(err, ShopError::ProductMismatch { .. }));
        assert_eq!(gateway.get_calls.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.capture_calls.load(Ordering::SeqCst), 0);
        assert!(session.order().is_some());
    }

    #[tokio::test]
    async fn test_failed_order_is_not_captured() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway.clone(), files());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        gateway.set_remote(OrderStatus::Failed);

        let err = flow.confirm(&mut session, XML_TOOL).await.unwrap_err();

        assert!(matches!(err, ShopError::PaymentFailed { .. }));
        assert_eq!(gateway.capture_calls.load(Ordering::SeqCst), 0);
        assert!(session.order().is_none());
        assert!(session.delivery().is_none());
    }

    #[tokio::test]
    async fn test_incomplete_capture_produces_no_download() {
        let gateway = Arc::new(FakeGateway::new());
        *gateway.capture_result.lock().unwrap() = OrderStatus::Approved;
        let flow = flow_with(gateway.clone(), files());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        gateway.set_remote(OrderStatus::Approved);

        let err = flow.confirm(&mut session, XML_TOOL).await.unwrap_err();

        assert!(matches!(err, ShopError::UnexpectedStatus { .. }));
        assert_eq!(session.order().unwrap().status, OrderStatus::Approved);
        assert!(session.delivery().is_none());
    }

    #[tokio::test]
    async fn test_unknown_remote_status_halts_flow() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway.clone(), files());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        gateway.set_remote_raw("PENDING_REVIEW");

        let err = flow.confirm(&mut session, XML_TOOL).await.unwrap_err();

        assert!(err.is_warning());
        assert_eq!(gateway.capture_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.order().unwrap().status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn test_completed_order_is_redelivered_without_capture() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway.clone(), files());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        gateway.set_remote(OrderStatus::Completed);

        let outcome = flow.confirm(&mut session, XML_TOOL).await.unwrap();

        assert!(matches!(outcome, ConfirmOutcome::Delivered(_)));
        assert_eq!(gateway.capture_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_confirm_is_idempotent() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway.clone(), files());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        gateway.set_remote(OrderStatus::Approved);
        flow.confirm(&mut session, XML_TOOL).await.unwrap();

        let calls_after_first = gateway.get_calls.load(Ordering::SeqCst);
        let again = flow.confirm(&mut session, XML_TOOL).await.unwrap();

        assert!(matches!(again, ConfirmOutcome::Delivered(ref d) if d.order_id() == "O1"));
        assert_eq!(gateway.capture_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.get_calls.load(Ordering::SeqCst), calls_after_first);

        let other = flow.confirm(&mut session, BULK_TOOL).await.unwrap_err();
        assert!(matches!(other, ShopError::NoActiveOrder));
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_paid_order() {
        let gateway = Arc::new(FakeGateway::new());
        let files = files();
        let flow = flow_with(gateway.clone(), files.clone());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        gateway.set_remote(OrderStatus::Approved);
        files.broken.store(true, Ordering::SeqCst);

        let err = flow.confirm(&mut session, XML_TOOL).await.unwrap_err();
        assert!(matches!(err, ShopError::FileRetrieval { .. }));
        assert!(session.has_undelivered_payment());

        // A new purchase cannot bury the paid order.
        assert!(matches!(
            flow.begin(&mut session, BULK_TOOL).await,
            Err(ShopError::InvalidRequest(_))
        ));

        files.broken.store(false, Ordering::SeqCst);
        let outcome = flow.confirm(&mut session, XML_TOOL).await.unwrap();

        assert!(matches!(outcome, ConfirmOutcome::Delivered(_)));
        assert_eq!(gateway.capture_calls.load(Ordering::SeqCst), 1);
        assert!(session.order().is_none());
    }

    #[tokio::test]
    async fn test_begin_replaces_abandoned_order() {
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway, files());
        let mut session = OrderSession::new();

        flow.begin(&mut session, XML_TOOL).await.unwrap();
        let second = flow.begin(&mut session, BULK_TOOL).await.unwrap();

        assert_eq!(second.order_id, "O2");
        assert_eq!(session.order().unwrap().product_id, BULK_TOOL);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let flow = flow_with(Arc::new(FakeGateway::new()), files());
        let mut session = OrderSession::new();

        assert!(matches!(
            flow.begin(&mut session, "nope").await,
            Err(ShopError::ProductNotFound { .. })
        ));
        assert!(matches!(
            flow.confirm(&mut session, XML_TOOL).await,
            Err(ShopError::NoActiveOrder)
        ));
        assert!(matches!(flow.redeliver(&session), Err(ShopError::NotDelivered)));
    }
}
