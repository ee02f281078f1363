//! Static device, locale, and screen facts reported to the backend during bootstrap.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Facts about the device hardware and operating system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct DeviceInfo {
    pub system_name: String,
    pub system_version: String,
    pub model: String,
    pub localized_model: String,
    /// Vendor-scoped device identifier. Seeds the session device id until the backend assigns
    /// one.
    pub identifier_for_vendor: Option<String>,
    pub is_physical_device: bool,
}

/// Screen metrics, in pixels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct WindowInfo {
    pub device_pixel_ratio: f64,
    pub width: f64,
    pub height: f64,
}

/// A flat record of device, window, and locale facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[allow(missing_docs)]
    pub device_info: DeviceInfo,
    #[allow(missing_docs)]
    pub window_info: WindowInfo,
    /// IANA time zone identifier, e.g. `Europe/Paris`.
    pub time_zone: String,
    /// ISO 639 language code.
    #[serde(default = "default_language_code")]
    pub language_code: String,
}

fn default_language_code() -> String {
    "en".to_owned()
}

impl Default for SystemInfo {
    fn default() -> Self {
        SystemInfo {
            device_info: DeviceInfo::default(),
            window_info: WindowInfo::default(),
            time_zone: "UTC".to_owned(),
            language_code: default_language_code(),
        }
    }
}

/// System info merged with SDK metadata, as sent to the `system-info` endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct SystemInfoReport<'a> {
    #[serde(flatten)]
    pub info: &'a SystemInfo,
    pub sdk_type: &'a str,
    pub sdk_version: &'a str,
    pub package_name: &'a str,
}

/// Source of system facts. Implemented by the host platform integration.
#[async_trait]
pub trait SystemInfoProvider: Send + Sync {
    /// Identifier of the host application package (bundle id).
    fn package_name(&self) -> String;

    /// Gather current device, window, and locale facts.
    async fn system_info(&self) -> SystemInfo;
}

/// A provider returning fixed values. Useful for hosts that collect the facts up front.
#[derive(Debug, Clone)]
pub struct StaticSystemInfo {
    package_name: String,
    info: SystemInfo,
}

impl StaticSystemInfo {
    #[allow(missing_docs)]
    pub fn new(package_name: impl Into<String>, info: SystemInfo) -> StaticSystemInfo {
        StaticSystemInfo {
            package_name: package_name.into(),
            info,
        }
    }
}

#[async_trait]
impl SystemInfoProvider for StaticSystemInfo {
    fn package_name(&self) -> String {
        self.package_name.clone()
    }

    async fn system_info(&self) -> SystemInfo {
        self.info.clone()
    }
}
