//! Contracts of the platform store: the transaction stream, transaction history, and product
//! catalog.
//!
//! The SDK never creates or finishes transactions; it only reads them.
use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::Result;

/// A purchase or restoration recorded by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Unique transaction identifier.
    pub id: String,
    /// Identifier of the purchased product.
    pub product_id: String,
    #[allow(missing_docs)]
    pub purchase_date: DateTime<Utc>,
    /// Identifier of the original purchase this transaction renews or restores. Equals `id` for
    /// first purchases.
    pub original_id: String,
    /// Set when the store revoked the purchase (refund, family sharing removal).
    pub revocation_date: Option<DateTime<Utc>>,
}

/// A transaction as delivered by the store, with the result of local signature verification.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    #[allow(missing_docs)]
    Verified(Transaction),
    /// The store could not verify the transaction locally.
    Unverified(Transaction, String),
}

impl VerificationResult {
    #[allow(missing_docs)]
    pub fn transaction(&self) -> &Transaction {
        match self {
            VerificationResult::Verified(transaction) => transaction,
            VerificationResult::Unverified(transaction, _) => transaction,
        }
    }

    /// Unwrap the transaction. Unverified transactions are accepted too: receipts and server-side
    /// verification are the authority, not local verification.
    pub fn into_transaction(self) -> Transaction {
        match self {
            VerificationResult::Verified(transaction) => transaction,
            VerificationResult::Unverified(transaction, reason) => {
                log::debug!(target: "gomarketme",
                    transaction_id = transaction.id.as_str(),
                    reason = reason.as_str();
                    "accepting locally unverified transaction");
                transaction
            }
        }
    }
}

/// A product snapshot from the store catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    #[allow(missing_docs)]
    pub id: String,
    #[allow(missing_docs)]
    pub display_name: String,
    #[allow(missing_docs)]
    pub description: String,
    /// Localized, formatted price, e.g. `$4.99`.
    pub display_price: String,
    /// Numeric price in `currency_code`.
    pub price: f64,
    /// ISO 4217 currency code.
    pub currency_code: String,
    /// Introductory offer of an auto-renewable subscription.
    pub introductory_offer: Option<IntroductoryOffer>,
}

/// Introductory offer of a subscription product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct IntroductoryOffer {
    #[serde(rename = "type")]
    pub offer_type: String,
    pub price: f64,
    pub display_price: String,
    pub period: SubscriptionPeriod,
    pub payment_mode: PaymentMode,
    pub period_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct SubscriptionPeriod {
    pub unit: PeriodUnit,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum PaymentMode {
    FreeTrial,
    PayAsYouGo,
    PayUpFront,
}

/// Source of store transactions. Implemented by the host platform integration.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Hand out the live stream of transaction updates.
    ///
    /// The stream is unbounded in time and can be taken once; later calls return `None`. Every
    /// item received from the stream counts as consumed, whether or not it is reported.
    fn updates(&self) -> Option<mpsc::Receiver<VerificationResult>>;

    /// The full transaction history known to the store, in store order.
    async fn all(&self) -> Vec<VerificationResult>;
}

/// Lookup of product metadata by identifier. Implemented by the host platform integration.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch products for the given identifiers. Unknown identifiers are omitted from the result.
    async fn products(&self, product_ids: &HashSet<String>) -> Result<Vec<Product>>;
}
