//! Transaction sync: turns store transactions into purchase events.
//!
//! Every observed transaction goes through one receipt refresh cycle:
//!
//! ```text
//! Observed -> ReceiptRequested -> ReceiptReady | ReceiptFailed
//! ReceiptReady -> Verified | VerificationFailed
//! Verified -> ProductsJoined -> Reported | ReportFailed
//! ```
//!
//! Failed cycles are not retried. Transactions that were not reported are picked up again by the
//! next full re-scan (app launch, foreground resume, or an explicit
//! [`Client::sync_all_transactions`](crate::Client::sync_all_transactions)).
//!
//! A re-scan batches all pending transactions into a single cycle: one receipt refresh, one
//! product lookup for the union of product ids, and one consolidated purchase event.
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use base64::prelude::*;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    api::ApiClient,
    events::{ProductRecord, PurchaseEvent, PurchaseRecord, VerificationData, PURCHASE_EVENT_TYPE},
    receipt::{BackgroundExecution, BackgroundTask, ReceiptRefresher},
    session::Session,
    store::{ProductCatalog, Transaction, TransactionSource, VerificationResult},
    verification::ReceiptVerifier,
    Error, ReportingPolicy,
};

/// Final stage reached by a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// A transaction was received from the store.
    Observed,
    /// A receipt refresh was started.
    ReceiptRequested,
    /// The store produced a receipt.
    ReceiptReady,
    /// The store failed to produce a receipt.
    ReceiptFailed,
    /// The backend accepted the receipt.
    Verified,
    /// The backend rejected the receipt or could not be reached.
    VerificationFailed,
    /// Product metadata was joined to the purchase.
    ProductsJoined,
    /// The purchase event was accepted by the backend.
    Reported,
    /// The purchase event could not be delivered.
    ReportFailed,
    /// The platform withdrew background time before the cycle finished.
    Expired,
    /// Nothing to do: reporting is not permitted yet, or every transaction was already reported.
    Skipped,
}

pub(crate) struct TransactionSyncConfig {
    pub policy: ReportingPolicy,
    pub background_task_name: String,
}

pub(crate) struct TransactionSync {
    api: Arc<ApiClient>,
    session: Arc<Session>,
    verifier: ReceiptVerifier,
    transactions: Arc<dyn TransactionSource>,
    catalog: Arc<dyn ProductCatalog>,
    receipts: Arc<dyn ReceiptRefresher>,
    background: Arc<dyn BackgroundExecution>,
    config: TransactionSyncConfig,
    /// Held for the duration of a refresh cycle, so at most one receipt refresh is in flight.
    cycle_lock: tokio::sync::Mutex<()>,
    /// Ids of transactions the backend accepted during this process lifetime.
    reported: Mutex<HashSet<String>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionSync {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        api: Arc<ApiClient>,
        session: Arc<Session>,
        transactions: Arc<dyn TransactionSource>,
        catalog: Arc<dyn ProductCatalog>,
        receipts: Arc<dyn ReceiptRefresher>,
        background: Arc<dyn BackgroundExecution>,
        config: TransactionSyncConfig,
    ) -> TransactionSync {
        TransactionSync {
            verifier: ReceiptVerifier::new(api.clone(), session.clone()),
            api,
            session,
            transactions,
            catalog,
            receipts,
            background,
            config,
            cycle_lock: tokio::sync::Mutex::new(()),
            reported: Mutex::new(HashSet::new()),
            listener: Mutex::new(None),
        }
    }

    /// Start the long-lived listener on the store's transaction stream. Does nothing if it is
    /// already running.
    ///
    /// Must be called inside a Tokio runtime.
    pub(crate) fn observe(self: &Arc<Self>) {
        let Ok(mut listener) = self.listener.lock() else {
            return;
        };
        if listener.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let Some(updates) = self.transactions.updates() else {
            log::warn!(target: "gomarketme", "transaction stream was already taken, not listening");
            return;
        };

        log::debug!(target: "gomarketme", "listening for transaction updates");
        *listener = Some(tokio::spawn(Arc::clone(self).listen(updates)));
    }

    /// Cancel the listener.
    pub(crate) fn stop(&self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }

    async fn listen(self: Arc<Self>, mut updates: mpsc::Receiver<VerificationResult>) {
        while let Some(result) = updates.recv().await {
            self.sync_transaction(result.into_transaction()).await;
        }
        log::debug!(target: "gomarketme", "transaction stream closed");
    }

    /// Re-scan the full transaction history and report everything not reported yet in a single
    /// cycle.
    pub(crate) async fn sync_all(&self) -> SyncStage {
        if !self.reporting_permitted() {
            log::debug!(target: "gomarketme", "attribution not resolved yet, skipping transaction sync");
            return SyncStage::Skipped;
        }

        let pending = self.unreported(
            self.transactions
                .all()
                .await
                .into_iter()
                .map(VerificationResult::into_transaction)
                .collect(),
        );
        let Some(current) = latest(&pending).cloned() else {
            log::debug!(target: "gomarketme", "no unreported transactions");
            return SyncStage::Skipped;
        };

        log::debug!(target: "gomarketme",
            transaction_count = pending.len();
            "syncing transaction history");
        self.run_cycle(current, pending).await
    }

    /// Report a single transaction.
    pub(crate) async fn sync_transaction(&self, transaction: Transaction) -> SyncStage {
        trace_stage(&transaction, SyncStage::Observed);

        if !self.reporting_permitted() {
            log::debug!(target: "gomarketme",
                transaction_id = transaction.id.as_str();
                "attribution not resolved yet, skipping transaction");
            return SyncStage::Skipped;
        }
        if self.is_reported(&transaction.id) {
            return SyncStage::Skipped;
        }

        self.run_cycle(transaction.clone(), vec![transaction]).await
    }

    async fn run_cycle(&self, current: Transaction, batch: Vec<Transaction>) -> SyncStage {
        let _cycle = self.cycle_lock.lock().await;

        // Another cycle may have reported part of the batch while we were waiting.
        let batch = self.unreported(batch);
        let current = if batch.iter().any(|t| t.id == current.id) {
            current
        } else {
            match latest(&batch) {
                Some(transaction) => transaction.clone(),
                None => return SyncStage::Skipped,
            }
        };

        let task = BackgroundTask::begin(
            self.background.clone(),
            &self.config.background_task_name,
        );
        let stage = tokio::select! {
            biased;
            stage = self.refresh_and_report(&current, &batch) => stage,
            _ = task.expired() => {
                log::warn!(target: "gomarketme",
                    transaction_id = current.id.as_str();
                    "background time expired before the purchase was reported");
                SyncStage::Expired
            }
        };
        task.release();

        stage
    }

    async fn refresh_and_report(&self, current: &Transaction, batch: &[Transaction]) -> SyncStage {
        trace_stage(current, SyncStage::ReceiptRequested);
        let refreshed = self.receipts.refresh().await;
        let receipt = match refreshed.and_then(|receipt| receipt.ok_or(Error::ReceiptUnavailable)) {
            Ok(receipt) => receipt,
            Err(err) => {
                log::warn!(target: "gomarketme", "receipt refresh failed: {:?}", err);
                return SyncStage::ReceiptFailed;
            }
        };
        trace_stage(current, SyncStage::ReceiptReady);

        let encoded_receipt = BASE64_STANDARD.encode(&receipt);
        let verification = match self.verifier.verify(&encoded_receipt).await {
            Ok(verification) if verification.is_valid => verification,
            Ok(_) => {
                log::warn!(target: "gomarketme", "backend rejected the receipt, not reporting");
                return SyncStage::VerificationFailed;
            }
            Err(err) => {
                log::warn!(target: "gomarketme", "receipt verification failed: {:?}", err);
                return SyncStage::VerificationFailed;
            }
        };
        trace_stage(current, SyncStage::Verified);

        let mut product_ids = verification.product_ids;
        product_ids.extend(batch.iter().map(|t| t.product_id.clone()));
        let products = self.catalog.products(&product_ids).await.unwrap_or_else(|err| {
            log::warn!(target: "gomarketme", "product lookup failed: {:?}", err);
            Vec::new()
        });
        if products.is_empty() {
            log::debug!(target: "gomarketme",
                product_count = product_ids.len();
                "no products found, reporting purchase without product details");
        }
        trace_stage(current, SyncStage::ProductsJoined);

        let event = PurchaseEvent {
            current: PurchaseRecord::from(current),
            verification_data: VerificationData {
                local_verification_data: encoded_receipt,
                source: self.api.source_name().to_owned(),
            },
            pending_complete_purchase: String::new(),
            error: String::new(),
            transactions: batch.iter().map(PurchaseRecord::from).collect(),
            products: products.iter().map(ProductRecord::from).collect(),
        };

        match self
            .api
            .post_event(&self.session, PURCHASE_EVENT_TYPE, &event)
            .await
        {
            Ok(()) => {
                self.mark_reported(batch);
                trace_stage(current, SyncStage::Reported);
                SyncStage::Reported
            }
            Err(err) => {
                log::warn!(target: "gomarketme",
                    transaction_id = current.id.as_str();
                    "failed to report purchase: {:?}", err);
                SyncStage::ReportFailed
            }
        }
    }

    fn reporting_permitted(&self) -> bool {
        if self.session.snapshot().api_key.is_empty() {
            return false;
        }
        match self.config.policy {
            ReportingPolicy::Always => true,
            ReportingPolicy::RequireCampaignCode => self.session.has_campaign_code(),
        }
    }

    fn is_reported(&self, transaction_id: &str) -> bool {
        self.reported
            .lock()
            .map(|reported| reported.contains(transaction_id))
            .unwrap_or(false)
    }

    fn unreported(&self, transactions: Vec<Transaction>) -> Vec<Transaction> {
        let Ok(reported) = self.reported.lock() else {
            return transactions;
        };
        let mut seen = HashSet::new();
        transactions
            .into_iter()
            .filter(|t| !reported.contains(&t.id) && seen.insert(t.id.clone()))
            .collect()
    }

    fn mark_reported(&self, batch: &[Transaction]) {
        if let Ok(mut reported) = self.reported.lock() {
            reported.extend(batch.iter().map(|t| t.id.clone()));
        }
    }
}

fn latest(transactions: &[Transaction]) -> Option<&Transaction> {
    transactions.iter().max_by_key(|t| t.purchase_date)
}

fn trace_stage(transaction: &Transaction, stage: SyncStage) {
    log::trace!(target: "gomarketme",
        transaction_id = transaction.id.as_str(),
        product_id = transaction.product_id.as_str(),
        stage:? = stage;
        "transaction sync stage");
}
