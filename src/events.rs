//! Bodies of events reported to the `event` endpoint.
use serde::Serialize;

use crate::store::{IntroductoryOffer, Product, Transaction};

/// Value of the `x-event-type` header for purchase events.
pub const PURCHASE_EVENT_TYPE: &str = "purchase";

/// Stable digest used by the backend as a dedup key. Unlike a per-process hash, it is equal across
/// app launches for the same input.
fn hash_code(parts: &[&str]) -> String {
    format!("{:x}", md5::compute(parts.join(":")))
}

/// Purchase fields of a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    #[serde(rename = "productID")]
    pub product_id: String,
    #[serde(rename = "purchaseID")]
    pub purchase_id: String,
    #[serde(rename = "originalPurchaseID")]
    pub original_purchase_id: String,
    /// Seconds since the Unix epoch.
    pub transaction_date: f64,
    pub status: &'static str,
    pub hash_code: String,
}

impl From<&Transaction> for PurchaseRecord {
    fn from(transaction: &Transaction) -> PurchaseRecord {
        let millis = transaction.purchase_date.timestamp_millis();
        PurchaseRecord {
            product_id: transaction.product_id.clone(),
            purchase_id: transaction.id.clone(),
            original_purchase_id: transaction.original_id.clone(),
            transaction_date: millis as f64 / 1000.0,
            status: match transaction.revocation_date {
                Some(_) => "revoked",
                None if transaction.original_id != transaction.id => "restored",
                None => "purchased",
            },
            hash_code: hash_code(&[
                transaction.id.as_str(),
                transaction.product_id.as_str(),
                millis.to_string().as_str(),
            ]),
        }
    }
}

/// Catalog fields of a product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    #[serde(rename = "productID")]
    pub product_id: String,
    pub product_title: String,
    pub product_description: String,
    pub product_price: String,
    pub product_raw_price: f64,
    pub product_currency_code: String,
    pub product_currency_symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introductory_offer: Option<IntroductoryOffer>,
    pub hash_code: String,
}

impl From<&Product> for ProductRecord {
    fn from(product: &Product) -> ProductRecord {
        ProductRecord {
            product_id: product.id.clone(),
            product_title: product.display_name.clone(),
            product_description: product.description.clone(),
            product_price: product.display_price.clone(),
            product_raw_price: product.price,
            product_currency_code: product.currency_code.clone(),
            // The store only exposes the code; the backend resolves the symbol.
            product_currency_symbol: product.currency_code.clone(),
            introductory_offer: product.introductory_offer.clone(),
            hash_code: hash_code(&[
                product.id.as_str(),
                product.price.to_string().as_str(),
                product.currency_code.as_str(),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationData {
    pub local_verification_data: String,
    pub source: String,
}

/// One event per receipt refresh cycle: the purchase that triggered the cycle, every transaction
/// batched into it, the receipt, and all products joined from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseEvent {
    #[serde(flatten)]
    pub current: PurchaseRecord,
    pub verification_data: VerificationData,
    pub pending_complete_purchase: String,
    pub error: String,
    pub transactions: Vec<PurchaseRecord>,
    pub products: Vec<ProductRecord>,
}
