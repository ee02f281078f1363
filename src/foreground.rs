//! Re-scans the transaction history when the host application returns to the foreground.
use std::sync::Arc;

use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};

use crate::sync::{SyncStage, TransactionSync};

/// Application lifecycle notifications forwarded by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycleEvent {
    /// The application is about to become active again.
    WillEnterForeground,
    /// The application moved to the background.
    DidEnterBackground,
}

/// A cheap handle that schedules a full transaction re-scan.
///
/// Obtain one with [`Client::foreground_trigger`](crate::Client::foreground_trigger) and call
/// [`ForegroundResumeTrigger::app_will_enter_foreground`] from the host's lifecycle callback, or
/// hand a stream of [`AppLifecycleEvent`]s to [`ForegroundResumeTrigger::watch_lifecycle`].
#[derive(Clone)]
pub struct ForegroundResumeTrigger {
    sync: Arc<TransactionSync>,
    runtime: Handle,
}

impl ForegroundResumeTrigger {
    pub(crate) fn new(sync: Arc<TransactionSync>, runtime: Handle) -> ForegroundResumeTrigger {
        ForegroundResumeTrigger { sync, runtime }
    }

    /// Schedule a re-scan. Returns immediately; the handle resolves to the stage the re-scan
    /// reached.
    ///
    /// Safe to call from any thread, including threads outside the runtime.
    pub fn app_will_enter_foreground(&self) -> JoinHandle<SyncStage> {
        log::debug!(target: "gomarketme", "app entering foreground, re-scanning transactions");
        let sync = self.sync.clone();
        self.runtime.spawn(async move { sync.sync_all().await })
    }

    /// Consume lifecycle events until the sender is dropped, re-scanning on every
    /// [`AppLifecycleEvent::WillEnterForeground`].
    pub fn watch_lifecycle(&self, mut events: mpsc::Receiver<AppLifecycleEvent>) -> JoinHandle<()> {
        let trigger = self.clone();
        self.runtime.spawn(async move {
            while let Some(event) = events.recv().await {
                if event == AppLifecycleEvent::WillEnterForeground {
                    // Re-scans serialize on the sync engine, no need to wait here.
                    trigger.app_will_enter_foreground();
                }
            }
        })
    }
}
