use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use gomarketme::{
    BackgroundExecution, BackgroundTaskId, ClientConfig, DeviceInfo, FileStore, Platform, Product,
    ProductCatalog, ReceiptRefresher, StaticSystemInfo, SystemInfo, TransactionSource,
    VerificationResult,
};

/// A store with no purchase history and a stream the demo never feeds.
struct EmptyStore {
    updates: Mutex<Option<mpsc::Receiver<VerificationResult>>>,
}

#[async_trait]
impl TransactionSource for EmptyStore {
    fn updates(&self) -> Option<mpsc::Receiver<VerificationResult>> {
        self.updates.lock().ok()?.take()
    }

    async fn all(&self) -> Vec<VerificationResult> {
        Vec::new()
    }
}

#[async_trait]
impl ProductCatalog for EmptyStore {
    async fn products(&self, _product_ids: &HashSet<String>) -> gomarketme::Result<Vec<Product>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl ReceiptRefresher for EmptyStore {
    async fn refresh(&self) -> gomarketme::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Desktop processes are never suspended, so background time is granted unconditionally.
#[derive(Default)]
struct AlwaysRunning {
    next_id: AtomicU64,
}

impl BackgroundExecution for AlwaysRunning {
    fn begin(&self, _name: &str, _on_expire: Box<dyn FnOnce() + Send>) -> Option<BackgroundTaskId> {
        Some(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn end(&self, _id: BackgroundTaskId) {}
}

#[tokio::main]
async fn main() -> gomarketme::Result<()> {
    env_logger::init();

    let api_key = std::env::var("GOMARKETME_API_KEY").unwrap();

    let (_updates, receiver) = mpsc::channel(16);
    let store = Arc::new(EmptyStore {
        updates: Mutex::new(Some(receiver)),
    });
    let system_info = SystemInfo {
        device_info: DeviceInfo {
            system_name: std::env::consts::OS.to_owned(),
            identifier_for_vendor: Some("demo-device".to_owned()),
            ..Default::default()
        },
        ..Default::default()
    };

    let platform = Platform::new(
        Arc::new(StaticSystemInfo::new("com.example.demo", system_info)),
        Arc::new(FileStore::new(std::env::temp_dir().join("gomarketme-demo.json"))),
        store.clone(),
        store.clone(),
        store,
        Arc::new(AlwaysRunning::default()),
    );
    let client = ClientConfig::new().to_client(platform)?;

    // Wait for registration and attribution. Until it finishes, `attribution()` returns None.
    let _ = client.initialize(&api_key).await;

    match client.attribution() {
        Some(data) => println!(
            "Attributed to campaign {:?} by affiliate {} {}",
            data.campaign.name, data.affiliate.first_name, data.affiliate.last_name
        ),
        None => println!("Not attributed"),
    }

    Ok(())
}
