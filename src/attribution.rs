//! Attribution record returned by the `system-info` endpoint.
use serde::{Deserialize, Serialize};

/// Identifiers carried by every `system-info` response. Organic installs (no affiliate) get a
/// device id but no campaign code, and none of the other attribution fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct AttributionIdentifiers {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub affiliate_campaign_code: Option<String>,
}

/// The authoritative attribution record for the current device: which campaign and affiliate are
/// credited for its purchases, and how revenue is split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateMarketingData {
    #[allow(missing_docs)]
    pub campaign: Campaign,
    #[allow(missing_docs)]
    pub affiliate: Affiliate,
    #[allow(missing_docs)]
    pub sale_distribution: SaleDistribution,
    /// Backend-issued token crediting the affiliate campaign. Sent with every purchase event.
    pub affiliate_campaign_code: String,
    /// Backend-assigned device identifier.
    pub device_id: String,
    /// Offer code to present to the user, if the campaign has one.
    #[serde(default)]
    pub offer_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub public_link_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Affiliate {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub country_code: String,
    #[serde(default)]
    pub instagram_account: Option<String>,
    #[serde(default)]
    pub tiktok_account: Option<String>,
    #[serde(default)]
    pub x_account: Option<String>,
}

/// Revenue split between the platform and the affiliate, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SaleDistribution {
    pub platform_percentage: String,
    pub affiliate_percentage: String,
}
