//! One-time registration sequence run on [`Client::initialize`](crate::Client::initialize).
//!
//! Steps are strictly ordered, each depending on the success of the previous one:
//! 1. register the install, unless the persisted flag says it is already registered;
//! 2. gather system info;
//! 3. report system info and receive the device identifiers and, for attributed installs, the
//!    attribution record;
//! 4. store the identifiers in the session and publish the record.
use std::sync::Arc;

use serde::Deserialize;

use crate::{
    api::ApiClient,
    attribution::AttributionIdentifiers,
    session::Session,
    storage::InitializationFlag,
    system_info::{SystemInfoProvider, SystemInfoReport},
    AffiliateMarketingData, Error, Result,
};

pub(crate) struct Bootstrap {
    api: Arc<ApiClient>,
    session: Arc<Session>,
    flag: InitializationFlag,
    system_info: Arc<dyn SystemInfoProvider>,
    // Held for a whole run, so a concurrent run sees the flag the first one set.
    run_lock: tokio::sync::Mutex<()>,
}

impl Bootstrap {
    pub(crate) fn new(
        api: Arc<ApiClient>,
        session: Arc<Session>,
        flag: InitializationFlag,
        system_info: Arc<dyn SystemInfoProvider>,
    ) -> Bootstrap {
        Bootstrap {
            api,
            session,
            flag,
            system_info,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run the sequence. Resolves to `None` for an organic install, which the backend knows but
    /// did not attribute to any affiliate campaign.
    pub(crate) async fn run(&self) -> Result<Option<AffiliateMarketingData>> {
        let _run = self.run_lock.lock().await;
        let api_key = self.session.snapshot().api_key;

        if !self.flag.is_set() {
            log::debug!(target: "gomarketme", "registering SDK installation");
            // A failed registration leaves the flag unset, so the next app launch retries.
            self.api.post_sdk_initialization(&api_key).await?;
            if let Err(err) = self.flag.mark() {
                log::warn!(target: "gomarketme", "failed to persist initialization flag: {:?}", err);
            }
        }

        let info = self.system_info.system_info().await;
        if let Some(vendor_id) = &info.device_info.identifier_for_vendor {
            self.session.seed_device_id(vendor_id);
        }

        let package_name = self.session.snapshot().package_name;
        let report = SystemInfoReport {
            info: &info,
            sdk_type: self.api.sdk_type(),
            sdk_version: self.api.sdk_version(),
            package_name: &package_name,
        };
        let body: serde_json::Value = match self.api.post_system_info(&api_key, &report).await {
            Ok(body) => body,
            Err(err) => {
                // Fail open: the host sees "not attributed yet".
                self.session.clear_attribution();
                return Err(err);
            }
        };

        let identifiers = match AttributionIdentifiers::deserialize(&body) {
            Ok(identifiers) => identifiers,
            Err(err) => {
                log::warn!(target: "gomarketme",
                    endpoint = "system-info";
                    "failed to parse response body: {:?}", err);
                self.session.clear_attribution();
                return Err(Error::from(err));
            }
        };
        let attributed = identifiers.affiliate_campaign_code.is_some();
        self.session.apply_identifiers(identifiers);

        match AffiliateMarketingData::deserialize(&body) {
            Ok(data) => {
                log::debug!(target: "gomarketme",
                    affiliate_campaign_code = data.affiliate_campaign_code.as_str(),
                    device_id = data.device_id.as_str();
                    "received attribution");
                self.session.apply_attribution(data.clone());
                Ok(Some(data))
            }
            Err(err) if attributed => {
                log::warn!(target: "gomarketme",
                    endpoint = "system-info";
                    "failed to parse attribution record: {:?}", err);
                self.session.clear_attribution();
                Err(Error::from(err))
            }
            Err(_) => {
                log::debug!(target: "gomarketme", "install is not attributed to a campaign");
                self.session.clear_attribution();
                Ok(None)
            }
        }
    }
}
