//! Fakes for platform collaborators, shared by unit tests.
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Notify};

use crate::{
    api::{ApiClient, Endpoint},
    attribution::{Affiliate, Campaign, SaleDistribution},
    receipt::{BackgroundExecution, BackgroundTaskId, ReceiptRefresher},
    session::Session,
    store::{
        IntroductoryOffer, PaymentMode, PeriodUnit, Product, ProductCatalog, SubscriptionPeriod,
        Transaction, TransactionSource, VerificationResult,
    },
    sync::{TransactionSync, TransactionSyncConfig},
    transport::{HttpRequest, HttpResponse, HttpTransport},
    AffiliateMarketingData, ClientConfig, Error, ReportingPolicy, Result,
};

pub(crate) const RECEIPT: &[u8] = b"signed-receipt";

pub(crate) fn transaction(id: &str, product_id: &str) -> Transaction {
    let purchase_date: DateTime<Utc> =
        DateTime::from_timestamp_millis(1_700_000_000_500).expect("valid timestamp");
    Transaction {
        id: id.to_owned(),
        product_id: product_id.to_owned(),
        purchase_date,
        original_id: id.to_owned(),
        revocation_date: None,
    }
}

pub(crate) fn product(id: &str) -> Product {
    Product {
        id: id.to_owned(),
        display_name: format!("{id} title"),
        description: format!("{id} description"),
        display_price: "$4.99".to_owned(),
        price: 4.99,
        currency_code: "USD".to_owned(),
        introductory_offer: None,
    }
}

pub(crate) fn subscription_product(id: &str) -> Product {
    Product {
        introductory_offer: Some(IntroductoryOffer {
            offer_type: "introductory".to_owned(),
            price: 0.0,
            display_price: "$0.00".to_owned(),
            period: SubscriptionPeriod {
                unit: PeriodUnit::Week,
                value: 1,
            },
            payment_mode: PaymentMode::FreeTrial,
            period_count: 1,
        }),
        ..product(id)
    }
}

pub(crate) fn attribution(campaign_code: &str, device_id: &str) -> AffiliateMarketingData {
    AffiliateMarketingData {
        campaign: Campaign {
            id: "c-1".to_owned(),
            name: "Spring launch".to_owned(),
            status: "ACTIVE".to_owned(),
            kind: "PAID".to_owned(),
            public_link_url: None,
        },
        affiliate: Affiliate {
            id: "a-7".to_owned(),
            first_name: "Sam".to_owned(),
            last_name: "Rivera".to_owned(),
            country_code: "US".to_owned(),
            instagram_account: None,
            tiktok_account: None,
            x_account: None,
        },
        sale_distribution: SaleDistribution {
            platform_percentage: "30".to_owned(),
            affiliate_percentage: "70".to_owned(),
        },
        affiliate_campaign_code: campaign_code.to_owned(),
        device_id: device_id.to_owned(),
        offer_code: None,
    }
}

pub(crate) fn attribution_json(campaign_code: &str, device_id: &str) -> String {
    serde_json::to_string(&attribution(campaign_code, device_id)).expect("serializable")
}

/// Poll `condition` until it holds. Panics after one second.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition should hold within a second");
}

impl HttpRequest {
    pub(crate) fn json_body(&self) -> serde_json::Value {
        match &self.body {
            Some(body) => serde_json::from_slice(body).expect("request body should be JSON"),
            None => serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(u16, String),
    Fail,
}

/// Records every request and answers from a per-endpoint script. Unscripted endpoints answer 200
/// with an empty body.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    requests: Mutex<Vec<HttpRequest>>,
    script: Mutex<HashMap<&'static str, Scripted>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> RecordingTransport {
        RecordingTransport::default()
    }

    pub(crate) fn respond(&self, endpoint: Endpoint, status: u16, body: &str) {
        self.script
            .lock()
            .unwrap()
            .insert(endpoint.path(), Scripted::Respond(status, body.to_owned()));
    }

    pub(crate) fn fail(&self, endpoint: Endpoint) {
        self.script
            .lock()
            .unwrap()
            .insert(endpoint.path(), Scripted::Fail);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_to(&self, endpoint: Endpoint) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url.path().ends_with(endpoint.path()))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        // Suspend like a real request would, letting concurrent callers interleave.
        tokio::task::yield_now().await;

        let scripted = {
            let script = self.script.lock().unwrap();
            script
                .iter()
                .find(|(path, _)| request.url.path().ends_with(*path))
                .map(|(_, scripted)| scripted.clone())
        };
        self.requests.lock().unwrap().push(request);

        match scripted {
            Some(Scripted::Respond(status, body)) => Ok(HttpResponse {
                status,
                body: body.into_bytes(),
            }),
            Some(Scripted::Fail) => Err(Error::from(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            None => Ok(HttpResponse {
                status: 200,
                body: Vec::new(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum ReceiptBehavior {
    #[default]
    Receipt,
    Absent,
    Fail,
}

/// Answers receipt refreshes from a script, optionally waiting on a gate first.
#[derive(Default)]
pub(crate) struct FakeReceiptRefresher {
    behavior: Mutex<ReceiptBehavior>,
    gate: Mutex<Option<Arc<Notify>>>,
    calls: AtomicUsize,
}

impl FakeReceiptRefresher {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn absent(&self) {
        *self.behavior.lock().unwrap() = ReceiptBehavior::Absent;
    }

    pub(crate) fn fail(&self) {
        *self.behavior.lock().unwrap() = ReceiptBehavior::Fail;
    }

    /// Hold every refresh until the returned gate is notified.
    pub(crate) fn gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl ReceiptRefresher for FakeReceiptRefresher {
    async fn refresh(&self) -> Result<Option<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            ReceiptBehavior::Receipt => Ok(Some(RECEIPT.to_vec())),
            ReceiptBehavior::Absent => Ok(None),
            ReceiptBehavior::Fail => Err(Error::ReceiptRefresh("store unavailable".to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum BackgroundMode {
    #[default]
    Grant,
    ExpireImmediately,
    Refuse,
}

/// Counts background task begins and ends, and can fire expiration handlers on demand.
#[derive(Default)]
pub(crate) struct CountingBackgroundExecution {
    mode: BackgroundMode,
    begun: AtomicUsize,
    ended: AtomicUsize,
    next_id: AtomicU64,
    handlers: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl CountingBackgroundExecution {
    pub(crate) fn expiring_immediately() -> CountingBackgroundExecution {
        CountingBackgroundExecution {
            mode: BackgroundMode::ExpireImmediately,
            ..Default::default()
        }
    }

    pub(crate) fn refusing() -> CountingBackgroundExecution {
        CountingBackgroundExecution {
            mode: BackgroundMode::Refuse,
            ..Default::default()
        }
    }

    pub(crate) fn begun(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }

    pub(crate) fn ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }

    /// Fire every pending expiration handler.
    pub(crate) fn expire_all(&self) {
        let handlers = std::mem::take(&mut *self.handlers.lock().unwrap());
        for handler in handlers {
            handler();
        }
    }
}

impl BackgroundExecution for CountingBackgroundExecution {
    fn begin(&self, _name: &str, on_expire: Box<dyn FnOnce() + Send>) -> Option<BackgroundTaskId> {
        if self.mode == BackgroundMode::Refuse {
            return None;
        }
        self.begun.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            BackgroundMode::ExpireImmediately => on_expire(),
            _ => self.handlers.lock().unwrap().push(on_expire),
        }
        Some(id)
    }

    fn end(&self, _id: BackgroundTaskId) {
        self.ended.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transaction history plus the live update stream.
pub(crate) struct FakeTransactionSource {
    updates: Mutex<Option<mpsc::Receiver<VerificationResult>>>,
    history: Mutex<Vec<VerificationResult>>,
}

impl FakeTransactionSource {
    pub(crate) fn new() -> (FakeTransactionSource, mpsc::Sender<VerificationResult>) {
        let (sender, receiver) = mpsc::channel(16);
        let source = FakeTransactionSource {
            updates: Mutex::new(Some(receiver)),
            history: Mutex::new(Vec::new()),
        };
        (source, sender)
    }

    pub(crate) fn push_history(&self, transaction: Transaction) {
        self.push_history_result(VerificationResult::Verified(transaction));
    }

    pub(crate) fn push_history_result(&self, result: VerificationResult) {
        self.history.lock().unwrap().push(result);
    }
}

#[async_trait]
impl TransactionSource for FakeTransactionSource {
    fn updates(&self) -> Option<mpsc::Receiver<VerificationResult>> {
        self.updates.lock().unwrap().take()
    }

    async fn all(&self) -> Vec<VerificationResult> {
        self.history.lock().unwrap().clone()
    }
}

/// Catalog answering from a fixed product list.
pub(crate) struct FakeCatalog {
    products: Vec<Product>,
    fail: Mutex<bool>,
    requested: Mutex<Vec<HashSet<String>>>,
}

impl FakeCatalog {
    pub(crate) fn new(products: Vec<Product>) -> FakeCatalog {
        FakeCatalog {
            products,
            fail: Mutex::new(false),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub(crate) fn lookups(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    pub(crate) fn requested(&self) -> Vec<HashSet<String>> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn products(&self, product_ids: &HashSet<String>) -> Result<Vec<Product>> {
        self.requested.lock().unwrap().push(product_ids.clone());
        if *self.fail.lock().unwrap() {
            return Err(Error::from(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "catalog unavailable",
            )));
        }
        Ok(self
            .products
            .iter()
            .filter(|product| product_ids.contains(&product.id))
            .cloned()
            .collect())
    }
}

/// A [`TransactionSync`] wired to fakes.
pub(crate) struct Harness {
    pub sync: Arc<TransactionSync>,
    pub session: Arc<Session>,
    pub transport: Arc<RecordingTransport>,
    pub receipts: Arc<FakeReceiptRefresher>,
    pub background: Arc<CountingBackgroundExecution>,
    pub catalog: Arc<FakeCatalog>,
    pub transactions: Arc<FakeTransactionSource>,
    pub updates: mpsc::Sender<VerificationResult>,
}

pub(crate) struct HarnessBuilder {
    policy: ReportingPolicy,
    products: Vec<Product>,
    attributed: bool,
}

impl Harness {
    pub(crate) fn builder() -> HarnessBuilder {
        HarnessBuilder {
            policy: ReportingPolicy::RequireCampaignCode,
            products: vec![product("pro_monthly")],
            attributed: false,
        }
    }

    pub(crate) fn attributed() -> Harness {
        Harness::builder().attributed().build()
    }

    pub(crate) fn unattributed() -> Harness {
        Harness::builder().build()
    }
}

impl HarnessBuilder {
    pub(crate) fn policy(mut self, policy: ReportingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub(crate) fn products(mut self, products: Vec<Product>) -> Self {
        self.products = products;
        self
    }

    pub(crate) fn attributed(mut self) -> Self {
        self.attributed = true;
        self
    }

    pub(crate) fn build(self) -> Harness {
        let _ = env_logger::builder().is_test(true).try_init();

        let transport = Arc::new(RecordingTransport::new());
        transport.respond(
            Endpoint::VerifyReceipt,
            200,
            r#"{"isValid": true, "productIds": []}"#,
        );
        let api = Arc::new(
            ApiClient::new(transport.clone(), &ClientConfig::new())
                .expect("default config is valid"),
        );

        let session = Arc::new(Session::new());
        session.set_api_key("key123");
        session.resolve_package_name(|| "com.example.app".to_owned());
        if self.attributed {
            session.apply_attribution(attribution("AFF42", "dev-9"));
        }

        let receipts = Arc::new(FakeReceiptRefresher::default());
        let background = Arc::new(CountingBackgroundExecution::default());
        let catalog = Arc::new(FakeCatalog::new(self.products));
        let (transactions, updates) = FakeTransactionSource::new();
        let transactions = Arc::new(transactions);

        let sync = Arc::new(TransactionSync::new(
            api,
            session.clone(),
            transactions.clone(),
            catalog.clone(),
            receipts.clone(),
            background.clone(),
            TransactionSyncConfig {
                policy: self.policy,
                background_task_name: ClientConfig::DEFAULT_BACKGROUND_TASK_NAME.to_owned(),
            },
        ));

        Harness {
            sync,
            session,
            transport,
            receipts,
            background,
            catalog,
            transactions,
            updates,
        }
    }
}
