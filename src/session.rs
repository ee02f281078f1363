//! Process-wide session state shared by the bootstrap, the transaction sync engine, and the host
//! application.
//!
//! [`Session`] is the only shared mutable resource of the SDK. Every component receives it by
//! `Arc` from the [`Client`](crate::Client) that owns it. Readers take a [`SessionSnapshot`] right
//! before they need the values (e.g., when building request headers) rather than holding on to
//! values read before a suspension point.
use std::sync::{Arc, OnceLock, RwLock};

use tokio::sync::watch;

use crate::{attribution::AttributionIdentifiers, AffiliateMarketingData};

#[derive(Debug, Default)]
struct Identity {
    device_id: String,
    affiliate_campaign_code: String,
}

/// Point-in-time copy of the session fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    #[allow(missing_docs)]
    pub api_key: String,
    /// Empty until system info or a backend response provides one.
    pub device_id: String,
    /// Empty until the backend attributes the device.
    pub affiliate_campaign_code: String,
    #[allow(missing_docs)]
    pub package_name: String,
}

/// Session state: API key, device id, affiliate campaign code, package name, and the published
/// attribution record.
pub struct Session {
    api_key: OnceLock<String>,
    package_name: OnceLock<String>,
    // Device id and campaign code are always written together under one lock, so a reader never
    // observes a code from one registration paired with the device id of another.
    identity: RwLock<Identity>,
    attribution: watch::Sender<Option<Arc<AffiliateMarketingData>>>,
}

impl Session {
    #[allow(missing_docs)]
    pub fn new() -> Session {
        let (attribution, _) = watch::channel(None);
        Session {
            api_key: OnceLock::new(),
            package_name: OnceLock::new(),
            identity: RwLock::new(Identity::default()),
            attribution,
        }
    }

    /// Set the API key. The first key wins; returns `false` if a key was already set.
    pub fn set_api_key(&self, api_key: &str) -> bool {
        self.api_key.set(api_key.to_owned()).is_ok()
    }

    /// Resolve the package name once, using `resolve` on first access.
    pub fn resolve_package_name(&self, resolve: impl FnOnce() -> String) -> &str {
        self.package_name.get_or_init(resolve)
    }

    /// Seed the device id from local device facts. Does nothing if a device id is already known.
    pub fn seed_device_id(&self, device_id: &str) {
        let Ok(mut identity) = self.identity.write() else {
            return;
        };
        if identity.device_id.is_empty() {
            identity.device_id = device_id.to_owned();
        }
    }

    /// Whether the backend has attributed this device to an affiliate campaign.
    pub fn has_campaign_code(&self) -> bool {
        self.identity
            .read()
            .map(|identity| !identity.affiliate_campaign_code.is_empty())
            .unwrap_or(false)
    }

    /// Take a consistent copy of all session fields.
    pub fn snapshot(&self) -> SessionSnapshot {
        let (device_id, affiliate_campaign_code) = match self.identity.read() {
            Ok(identity) => (
                identity.device_id.clone(),
                identity.affiliate_campaign_code.clone(),
            ),
            // A writer panicked while holding the lock. Report as "not attributed yet" rather
            // than crashing the host.
            Err(_) => Default::default(),
        };

        SessionSnapshot {
            api_key: self.api_key.get().cloned().unwrap_or_default(),
            device_id,
            affiliate_campaign_code,
            package_name: self.package_name.get().cloned().unwrap_or_default(),
        }
    }

    /// Store identifiers from a `system-info` response.
    ///
    /// The campaign code is replaced as given, so an organic response clears it. A missing device
    /// id keeps the one already known.
    pub(crate) fn apply_identifiers(&self, identifiers: AttributionIdentifiers) {
        if let Ok(mut identity) = self.identity.write() {
            if let Some(device_id) = identifiers.device_id {
                identity.device_id = device_id;
            }
            identity.affiliate_campaign_code =
                identifiers.affiliate_campaign_code.unwrap_or_default();
        }
    }

    /// Store identifiers from a fresh attribution record and publish it to observers.
    pub fn apply_attribution(&self, data: AffiliateMarketingData) {
        self.apply_identifiers(AttributionIdentifiers {
            device_id: Some(data.device_id.clone()),
            affiliate_campaign_code: Some(data.affiliate_campaign_code.clone()),
        });
        self.attribution.send_replace(Some(Arc::new(data)));
    }

    /// Withdraw the published attribution record. Session identifiers are kept.
    pub fn clear_attribution(&self) {
        self.attribution.send_replace(None);
    }

    /// Currently published attribution record. `None` means "not attributed yet".
    pub fn attribution(&self) -> Option<Arc<AffiliateMarketingData>> {
        self.attribution.borrow().clone()
    }

    /// Observe changes of the published attribution record.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<AffiliateMarketingData>>> {
        self.attribution.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
