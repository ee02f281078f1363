//! Server-side receipt verification.
use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{api::ApiClient, session::Session, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyReceiptRequest<'a> {
    receipt_data: &'a str,
    package_name: &'a str,
}

/// The backend verdict on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptVerification {
    /// Whether the receipt is genuine.
    pub is_valid: bool,
    /// Products the receipt is known to cover.
    #[serde(default)]
    pub product_ids: HashSet<String>,
}

/// Submits receipts to the backend for validation. A failed request is returned to the caller as
/// is; there is no retry.
pub(crate) struct ReceiptVerifier {
    api: Arc<ApiClient>,
    session: Arc<Session>,
}

impl ReceiptVerifier {
    pub(crate) fn new(api: Arc<ApiClient>, session: Arc<Session>) -> ReceiptVerifier {
        ReceiptVerifier { api, session }
    }

    /// Verify a base64-encoded receipt.
    ///
    /// Fails on transport errors, non-200 responses, empty bodies, and undecodable bodies.
    pub(crate) async fn verify(&self, encoded_receipt: &str) -> Result<ReceiptVerification> {
        let package_name = self.session.snapshot().package_name;
        let request = VerifyReceiptRequest {
            receipt_data: encoded_receipt,
            package_name: &package_name,
        };

        let verification: ReceiptVerification = self
            .api
            .post_verify_receipt(&self.session, &request)
            .await?;

        log::debug!(target: "gomarketme",
            is_valid = verification.is_valid,
            product_count = verification.product_ids.len();
            "receipt verified");

        Ok(verification)
    }
}
