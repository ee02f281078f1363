//! Receipt acquisition and the background-execution token held while it runs.
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::Result;

/// Refreshes the store-signed receipt. Implemented by the host platform integration.
#[async_trait]
pub trait ReceiptRefresher: Send + Sync {
    /// Ask the store for a fresh receipt and wait for the outcome.
    ///
    /// Returns `Ok(Some(bytes))` when the refresh finished and a receipt is present,
    /// `Ok(None)` when it finished but the device holds no receipt, and `Err` when the refresh
    /// failed.
    async fn refresh(&self) -> Result<Option<Vec<u8>>>;
}

/// Platform-issued identifier of a background task.
pub type BackgroundTaskId = u64;

/// Capability to keep the process running in the background for a while. Implemented by the host
/// platform integration.
pub trait BackgroundExecution: Send + Sync {
    /// Begin a background task. `on_expire` is invoked by the platform, at most once, if the
    /// granted time runs out before [`BackgroundExecution::end`] is called.
    ///
    /// Returns `None` if the platform refused to grant background time.
    fn begin(&self, name: &str, on_expire: Box<dyn FnOnce() + Send>) -> Option<BackgroundTaskId>;

    /// End a background task.
    fn end(&self, id: BackgroundTaskId);
}

#[derive(Default)]
struct TaskState {
    id: Option<BackgroundTaskId>,
    released: bool,
}

struct TaskInner {
    execution: Arc<dyn BackgroundExecution>,
    state: Mutex<TaskState>,
    expired: watch::Sender<bool>,
}

impl TaskInner {
    fn release(&self) {
        let id = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.released {
                return;
            }
            state.released = true;
            state.id.take()
        };
        if let Some(id) = id {
            self.execution.end(id);
        }
    }
}

/// A scoped background-execution token.
///
/// The underlying platform task is ended exactly once: on [`BackgroundTask::release`], when the
/// token is dropped, or when the platform reports expiration, whichever comes first.
pub struct BackgroundTask {
    inner: Arc<TaskInner>,
}

impl BackgroundTask {
    /// Begin a background task named `name`.
    pub fn begin(execution: Arc<dyn BackgroundExecution>, name: &str) -> BackgroundTask {
        let (expired, _) = watch::channel(false);
        let inner = Arc::new(TaskInner {
            execution,
            state: Mutex::new(TaskState::default()),
            expired,
        });

        let on_expire = {
            let inner: Weak<TaskInner> = Arc::downgrade(&inner);
            Box::new(move || {
                if let Some(inner) = inner.upgrade() {
                    log::debug!(target: "gomarketme", "background task expired");
                    inner.expired.send_replace(true);
                    inner.release();
                }
            })
        };

        match inner.execution.begin(name, on_expire) {
            Some(id) => {
                let released_early = match inner.state.lock() {
                    Ok(mut state) if !state.released => {
                        state.id = Some(id);
                        false
                    }
                    // Expired (or poisoned) before the id was known: nobody else can end it.
                    _ => true,
                };
                if released_early {
                    inner.execution.end(id);
                }
            }
            None => {
                log::debug!(target: "gomarketme", "platform refused background time");
            }
        }

        BackgroundTask { inner }
    }

    /// End the background task now. Subsequent calls (and drop) do nothing.
    pub fn release(&self) {
        self.inner.release();
    }

    /// Whether the platform reported expiration.
    pub fn is_expired(&self) -> bool {
        *self.inner.expired.borrow()
    }

    /// Wait until the platform reports expiration. Never resolves if it does not.
    pub async fn expired(&self) {
        let mut receiver = self.inner.expired.subscribe();
        if receiver.wait_for(|expired| *expired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.inner.release();
    }
}
