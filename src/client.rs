use std::sync::Arc;

use tokio::{runtime::Handle, sync::watch, task::JoinHandle};

use crate::{
    api::ApiClient,
    bootstrap::Bootstrap,
    foreground::ForegroundResumeTrigger,
    receipt::{BackgroundExecution, ReceiptRefresher},
    session::{Session, SessionSnapshot},
    storage::{InitializationFlag, KeyValueStore},
    store::{ProductCatalog, Transaction, TransactionSource},
    sync::{SyncStage, TransactionSync, TransactionSyncConfig},
    system_info::SystemInfoProvider,
    transport::{HttpTransport, ReqwestTransport},
    AffiliateMarketingData, ClientConfig, Error, Result,
};

/// Host platform capabilities the SDK runs on.
///
/// Everything except the HTTP transport must be provided by the host integration. The transport
/// defaults to [`ReqwestTransport`].
#[derive(Clone)]
pub struct Platform {
    /// Device, window, and locale facts.
    pub system_info: Arc<dyn SystemInfoProvider>,
    /// Durable storage for the initialization flag.
    pub storage: Arc<dyn KeyValueStore>,
    /// The store's transaction stream and history.
    pub transactions: Arc<dyn TransactionSource>,
    /// The store's product catalog.
    pub catalog: Arc<dyn ProductCatalog>,
    /// The store's receipt refresh.
    pub receipts: Arc<dyn ReceiptRefresher>,
    /// Background execution time while a receipt is refreshed.
    pub background: Arc<dyn BackgroundExecution>,
    /// HTTP transport used for every backend call.
    pub transport: Arc<dyn HttpTransport>,
}

impl Platform {
    /// Bundle platform capabilities, using [`ReqwestTransport`] for HTTP.
    pub fn new(
        system_info: Arc<dyn SystemInfoProvider>,
        storage: Arc<dyn KeyValueStore>,
        transactions: Arc<dyn TransactionSource>,
        catalog: Arc<dyn ProductCatalog>,
        receipts: Arc<dyn ReceiptRefresher>,
        background: Arc<dyn BackgroundExecution>,
    ) -> Platform {
        Platform {
            system_info,
            storage,
            transactions,
            catalog,
            receipts,
            background,
            transport: Arc::new(ReqwestTransport::new()),
        }
    }

    /// Replace the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Platform {
        self.transport = transport;
        self
    }
}

/// A client for the GoMarketMe attribution backend.
///
/// In order to create a client instance, first create [`ClientConfig`] and a [`Platform`]. The
/// client must be created inside a Tokio runtime; background work is spawned on that runtime.
///
/// # Examples
/// ```no_run
/// # async fn run(platform: gomarketme::Platform) -> gomarketme::Result<()> {
/// use gomarketme::ClientConfig;
///
/// let client = ClientConfig::new().to_client(platform)?;
/// client.initialize("api-key");
///
/// let mut attribution = client.subscribe_attribution();
/// attribution.changed().await.ok();
/// println!("{:?}", attribution.borrow().as_deref());
/// # Ok(())
/// # }
/// ```
pub struct Client {
    session: Arc<Session>,
    bootstrap: Arc<Bootstrap>,
    sync: Arc<TransactionSync>,
    runtime: Handle,
}

impl Client {
    /// Create a new `Client` using the specified configuration and platform capabilities.
    ///
    /// Fails with [`Error::NoRuntime`] outside a Tokio runtime and with [`Error::InvalidBaseUrl`]
    /// if the configured base URL does not parse.
    pub fn new(config: ClientConfig, platform: Platform) -> Result<Client> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let api = Arc::new(ApiClient::new(platform.transport, &config)?);

        let session = Arc::new(Session::new());
        let system_info = platform.system_info;
        session.resolve_package_name(|| system_info.package_name());

        let bootstrap = Arc::new(Bootstrap::new(
            api.clone(),
            session.clone(),
            InitializationFlag::new(platform.storage),
            system_info,
        ));
        let sync = Arc::new(TransactionSync::new(
            api,
            session.clone(),
            platform.transactions,
            platform.catalog,
            platform.receipts,
            platform.background,
            TransactionSyncConfig {
                policy: config.reporting_policy,
                background_task_name: config.background_task_name,
            },
        ));

        Ok(Client {
            session,
            bootstrap,
            sync,
            runtime,
        })
    }

    /// Initialize the SDK with an API key.
    ///
    /// Returns immediately. Registration, attribution, and the transaction listener are set up on
    /// a background task; failures are logged, not returned. The returned handle may be awaited
    /// to know when that setup finished.
    ///
    /// Only the first API key is used. Calling this again re-runs attribution (registration is
    /// never repeated once it succeeded on this install).
    pub fn initialize(&self, api_key: &str) -> JoinHandle<()> {
        if !self.session.set_api_key(api_key) && self.session.snapshot().api_key != api_key {
            log::warn!(target: "gomarketme", "SDK already initialized with a different API key, ignoring the new one");
        }

        let bootstrap = self.bootstrap.clone();
        let sync = self.sync.clone();
        self.runtime.spawn(async move {
            let bootstrapped = bootstrap
                .run()
                .await
                .inspect_err(|err| {
                    log::warn!(target: "gomarketme", "SDK initialization failed: {:?}", err);
                })
                .is_ok();

            // The listener gates reporting on the session itself, so it runs either way.
            sync.observe();

            if bootstrapped {
                sync.sync_all().await;
            }
        })
    }

    /// Currently known attribution record. `None` until the backend attributed this device.
    pub fn attribution(&self) -> Option<Arc<AffiliateMarketingData>> {
        self.session.attribution()
    }

    /// Observe the attribution record as it is resolved or cleared.
    pub fn subscribe_attribution(&self) -> watch::Receiver<Option<Arc<AffiliateMarketingData>>> {
        self.session.subscribe()
    }

    /// Current session identifiers.
    pub fn session(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Re-scan the full transaction history and report everything not reported yet.
    pub async fn sync_all_transactions(&self) -> SyncStage {
        self.sync.sync_all().await
    }

    /// Report a single transaction, e.g. one the host finished outside the observed stream.
    pub async fn sync_transaction(&self, transaction: Transaction) -> SyncStage {
        self.sync.sync_transaction(transaction).await
    }

    /// A handle to wire into the host's "will enter foreground" notification.
    pub fn foreground_trigger(&self) -> ForegroundResumeTrigger {
        ForegroundResumeTrigger::new(self.sync.clone(), self.runtime.clone())
    }

    /// Stop listening for transactions. In-flight requests are left to complete.
    pub fn shutdown(&self) {
        self.sync.stop();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.sync.stop();
    }
}
