//! The Rust SDK for GoMarketMe, an affiliate marketing platform for mobile apps.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] that runs inside a host application. On
//! [`Client::initialize`] it registers the install with the GoMarketMe backend, reports device
//! facts, and receives an [`AffiliateMarketingData`] record telling which affiliate campaign (if
//! any) brought the user in. From then on it observes the app store's transactions and reports each
//! genuine purchase, together with its verified receipt and product details, tagged with the
//! attribution identifiers.
//!
//! The SDK does not talk to an app store itself. The host supplies store, storage, and device
//! capabilities through a [`Platform`] bundle of traits ([`TransactionSource`],
//! [`ProductCatalog`], [`ReceiptRefresher`], [`BackgroundExecution`], [`KeyValueStore`],
//! [`SystemInfoProvider`]).
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! Attribution must never break the host app, so the fire-and-forget entry points
//! ([`Client::initialize`], the transaction listener, [`ForegroundResumeTrigger`]) log failures
//! instead of returning them. Purchases that could not be reported are picked up again by the next
//! re-scan.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages, all
//! under the `gomarketme` target. Consider integrating a `log`-compatible logger implementation for
//! better visibility into SDK operations.
//!
//! # Examples
//!
//! An example wiring the client to in-memory platform capabilities can be found in the `demos`
//! directory of the crate repository.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod api;
mod attribution;
mod bootstrap;
mod client;
mod config;
mod error;
mod events;
mod foreground;
mod receipt;
mod session;
mod storage;
mod store;
mod sync;
mod system_info;
mod transport;
mod verification;

#[cfg(test)]
mod testing;

pub use attribution::{Affiliate, AffiliateMarketingData, Campaign, SaleDistribution};
pub use client::{Client, Platform};
pub use config::{ClientConfig, ReportingPolicy};
pub use error::{Error, Result};
pub use foreground::{AppLifecycleEvent, ForegroundResumeTrigger};
pub use receipt::{BackgroundExecution, BackgroundTask, BackgroundTaskId, ReceiptRefresher};
pub use session::SessionSnapshot;
pub use storage::{FileStore, InitializationFlag, KeyValueStore, MemoryStore};
pub use store::{
    IntroductoryOffer, PaymentMode, PeriodUnit, Product, ProductCatalog, SubscriptionPeriod,
    Transaction, TransactionSource, VerificationResult,
};
pub use sync::SyncStage;
pub use system_info::{DeviceInfo, StaticSystemInfo, SystemInfo, SystemInfoProvider, WindowInfo};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use verification::ReceiptVerification;
