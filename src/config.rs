use crate::{Client, Platform, Result};

/// Decides whether observed transactions are reported before the backend has attributed the
/// device to an affiliate campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportingPolicy {
    /// Report only while the session holds an affiliate campaign code. Transactions observed
    /// earlier are consumed and picked up again by the next full re-scan.
    #[default]
    RequireCampaignCode,
    /// Report every transaction, sending an empty campaign code when none is known.
    Always,
}

/// Configuration for [`Client`].
///
/// # Examples
/// ```
/// # use gomarketme::{ClientConfig, ReportingPolicy};
/// let config = ClientConfig::new()
///     .base_url("https://api.gomarketme.net/v1")
///     .reporting_policy(ReportingPolicy::RequireCampaignCode);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) base_url: String,
    pub(crate) sdk_type: String,
    pub(crate) sdk_version: String,
    pub(crate) source_name: String,
    pub(crate) reporting_policy: ReportingPolicy,
    pub(crate) background_task_name: String,
}

impl ClientConfig {
    /// Default base URL for API calls.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.gomarketme.net/v1";

    /// Default value sent in the `x-sdk-type` header.
    pub const DEFAULT_SDK_TYPE: &'static str = "Rust";

    /// Default store name sent in `x-source-name`.
    pub const DEFAULT_SOURCE_NAME: &'static str = "app_store";

    /// Default name of the background task held during receipt refresh.
    pub const DEFAULT_BACKGROUND_TASK_NAME: &'static str = "SKReceiptRefreshRequest";

    /// Create a default GoMarketMe configuration.
    pub fn new() -> Self {
        ClientConfig::default()
    }

    /// Override base URL for API calls. Clients should use the default setting in most cases.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the SDK type reported to the backend. Wrappers embedding this crate (e.g., a
    /// Swift or Kotlin binding) should report their own type.
    pub fn sdk_type(mut self, sdk_type: impl Into<String>) -> Self {
        self.sdk_type = sdk_type.into();
        self
    }

    /// Override the SDK version reported to the backend.
    pub fn sdk_version(mut self, sdk_version: impl Into<String>) -> Self {
        self.sdk_version = sdk_version.into();
        self
    }

    /// Override the store name sent with every purchase.
    pub fn source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    /// Choose whether purchases are reported before attribution is resolved.
    pub fn reporting_policy(mut self, policy: ReportingPolicy) -> Self {
        self.reporting_policy = policy;
        self
    }

    /// Override the name of the background task held while a receipt is refreshed.
    pub fn background_task_name(mut self, name: impl Into<String>) -> Self {
        self.background_task_name = name.into();
        self
    }

    /// Create a new [`Client`] using this configuration and the host platform collaborators.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn to_client(self, platform: Platform) -> Result<Client> {
        Client::new(self, platform)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: ClientConfig::DEFAULT_BASE_URL.to_owned(),
            sdk_type: ClientConfig::DEFAULT_SDK_TYPE.to_owned(),
            sdk_version: env!("CARGO_PKG_VERSION").to_owned(),
            source_name: ClientConfig::DEFAULT_SOURCE_NAME.to_owned(),
            reporting_policy: ReportingPolicy::default(),
            background_task_name: ClientConfig::DEFAULT_BACKGROUND_TASK_NAME.to_owned(),
        }
    }
}
