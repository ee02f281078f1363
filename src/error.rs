use std::sync::Arc;

/// Represents a result type for operations in the GoMarketMe SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the GoMarketMe SDK.
///
/// None of these errors are fatal to the host application. Public entry points log them and
/// degrade to "try again on the next trigger".
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The server answered with a status other than 200.
    #[error("received {status} from {endpoint}")]
    UnexpectedStatus {
        /// Endpoint name, e.g. `system-info`.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// The server answered 200 without a body where one was required.
    #[error("empty response body from {endpoint}")]
    EmptyBody {
        /// Endpoint name, e.g. `app-store-verify-receipt`.
        endpoint: &'static str,
    },

    /// Failed to decode or encode a JSON body.
    #[error("failed to decode response body")]
    Decode(#[source] Arc<serde_json::Error>),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// Key-value storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The store failed to refresh the receipt.
    #[error("receipt refresh failed: {0}")]
    ReceiptRefresh(String),

    /// Receipt refresh finished, but no receipt is present on the device.
    #[error("no receipt available after refresh")]
    ReceiptUnavailable,

    /// The client was created outside of a Tokio runtime.
    #[error("GoMarketMe client must be created inside a Tokio runtime")]
    NoRuntime,
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Decode(Arc::new(value))
    }
}
