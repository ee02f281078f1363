//! An HTTP client for the GoMarketMe backend. Knows endpoint URLs and the header set each of them
//! requires. It never retries: the retry unit is the next external trigger.
use std::sync::Arc;

use reqwest::Url;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    session::Session,
    system_info::SystemInfoReport,
    transport::{HttpRequest, HttpResponse, HttpTransport},
    ClientConfig, Error, Result,
};

/// Backend endpoints. All of them accept JSON `POST` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    SdkInitialization,
    SystemInfo,
    VerifyReceipt,
    Event,
}

impl Endpoint {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Endpoint::SdkInitialization => "sdk-initialization",
            Endpoint::SystemInfo => "system-info",
            Endpoint::VerifyReceipt => "app-store-verify-receipt",
            Endpoint::Event => "event",
        }
    }

    pub(crate) fn path(self) -> &'static str {
        match self {
            Endpoint::SdkInitialization => "/sdk-initialization",
            Endpoint::SystemInfo => "/mobile/system-info",
            Endpoint::VerifyReceipt => "/app-store-verify-receipt",
            Endpoint::Event => "/event",
        }
    }
}

#[derive(Debug, Clone)]
struct Endpoints {
    sdk_initialization: Url,
    system_info: Url,
    verify_receipt: Url,
    event: Url,
}

impl Endpoints {
    fn new(base_url: &str) -> Result<Endpoints> {
        let base_url = base_url.trim_end_matches('/');
        let url = |endpoint: Endpoint| {
            Url::parse(&format!("{}{}", base_url, endpoint.path())).map_err(Error::InvalidBaseUrl)
        };

        Ok(Endpoints {
            sdk_initialization: url(Endpoint::SdkInitialization)?,
            system_info: url(Endpoint::SystemInfo)?,
            verify_receipt: url(Endpoint::VerifyReceipt)?,
            event: url(Endpoint::Event)?,
        })
    }

    fn get(&self, endpoint: Endpoint) -> &Url {
        match endpoint {
            Endpoint::SdkInitialization => &self.sdk_initialization,
            Endpoint::SystemInfo => &self.system_info,
            Endpoint::VerifyReceipt => &self.verify_receipt,
            Endpoint::Event => &self.event,
        }
    }
}

pub(crate) struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
    sdk_type: String,
    sdk_version: String,
    source_name: String,
}

impl ApiClient {
    pub(crate) fn new(
        transport: Arc<dyn HttpTransport>,
        config: &ClientConfig,
    ) -> Result<ApiClient> {
        Ok(ApiClient {
            transport,
            endpoints: Endpoints::new(&config.base_url)?,
            sdk_type: config.sdk_type.clone(),
            sdk_version: config.sdk_version.clone(),
            source_name: config.source_name.clone(),
        })
    }

    pub(crate) fn sdk_type(&self) -> &str {
        &self.sdk_type
    }

    pub(crate) fn sdk_version(&self) -> &str {
        &self.sdk_version
    }

    pub(crate) fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Register this install with the backend.
    pub(crate) async fn post_sdk_initialization(&self, api_key: &str) -> Result<()> {
        let headers = vec![("x-api-key", api_key.to_owned())];
        self.send(Endpoint::SdkInitialization, headers, None::<&()>)
            .await?;
        Ok(())
    }

    /// Report system facts and decode the backend's answer about this device.
    pub(crate) async fn post_system_info<T: DeserializeOwned>(
        &self,
        api_key: &str,
        report: &SystemInfoReport<'_>,
    ) -> Result<T> {
        let headers = vec![("x-api-key", api_key.to_owned())];
        let response = self
            .send(Endpoint::SystemInfo, headers, Some(report))
            .await?;
        decode(Endpoint::SystemInfo, &response)
    }

    /// Submit an encoded receipt for server-side validation and decode the verdict.
    pub(crate) async fn post_verify_receipt<B: Serialize, T: DeserializeOwned>(
        &self,
        session: &Session,
        body: &B,
    ) -> Result<T> {
        let snapshot = session.snapshot();
        let headers = vec![
            ("x-api-key", snapshot.api_key),
            ("x-device-id", snapshot.device_id),
            ("x-sdk-type", self.sdk_type.clone()),
            ("x-sdk-version", self.sdk_version.clone()),
        ];
        let response = self
            .send(Endpoint::VerifyReceipt, headers, Some(body))
            .await?;
        decode(Endpoint::VerifyReceipt, &response)
    }

    /// Report an event.
    ///
    /// Session values are read when the request is built, not when the reported data was
    /// captured, so events observed before attribution carry the identifiers known at send time.
    pub(crate) async fn post_event<B: Serialize>(
        &self,
        session: &Session,
        event_type: &str,
        body: &B,
    ) -> Result<()> {
        let snapshot = session.snapshot();
        let headers = vec![
            ("x-api-key", snapshot.api_key),
            ("x-device-id", snapshot.device_id),
            ("x-affiliate-campaign-code", snapshot.affiliate_campaign_code),
            ("x-event-type", event_type.to_owned()),
            ("x-package-name", snapshot.package_name),
            ("x-sdk-type", self.sdk_type.clone()),
            ("x-sdk-version", self.sdk_version.clone()),
            ("x-source-name", self.source_name.clone()),
        ];
        self.send(Endpoint::Event, headers, Some(body)).await?;
        Ok(())
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        headers: Vec<(&'static str, String)>,
        body: Option<&B>,
    ) -> Result<HttpResponse> {
        let body = body.map(serde_json::to_vec).transpose()?;
        let request = HttpRequest {
            url: self.endpoints.get(endpoint).clone(),
            headers,
            body,
        };

        log::debug!(target: "gomarketme", endpoint = endpoint.name(); "sending request");
        let response = self.transport.post(request).await.inspect_err(|err| {
            log::warn!(target: "gomarketme", endpoint = endpoint.name(); "network error: {:?}", err);
        })?;

        if !response.is_ok() {
            log::warn!(target: "gomarketme",
                endpoint = endpoint.name(),
                status = response.status;
                "received non-200 response");
            return Err(Error::UnexpectedStatus {
                endpoint: endpoint.name(),
                status: response.status,
            });
        }

        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(endpoint: Endpoint, response: &HttpResponse) -> Result<T> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::EmptyBody {
            endpoint: endpoint.name(),
        });
    }
    serde_json::from_slice(&response.body).map_err(|err| {
        log::warn!(target: "gomarketme",
            endpoint = endpoint.name();
            "failed to parse response body: {:?}", err);
        Error::from(err)
    })
}
