use chrono::NaiveDate;
use common::Money;
use domain::{Address, LabelFormat, PackageSpec};
use serde::{Deserialize, Serialize};

/// Input for a rate quote: where the packages are going and what they
/// weigh and measure.
#[derive(Debug, Clone)]
pub struct RateRequest {
    pub destination: Address,
    pub packages: Vec<PackageSpec>,
}

/// One priced service offering, normalized across carriers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateOffer {
    /// Carrier name, e.g. "UPS" or "USPS".
    pub carrier: String,
    /// Carrier-native service code, e.g. "03" or "PRIORITY_MAIL".
    pub service_code: String,
    /// Human-readable service name; falls back to the raw code for
    /// codes the adapter does not recognize.
    pub service_name: String,
    pub price: Money,
    pub currency: String,
    pub estimated_days: Option<u32>,
    pub estimated_delivery_date: Option<NaiveDate>,
}

/// Input for a label purchase.
#[derive(Debug, Clone)]
pub struct ShipmentRequest {
    pub service_code: String,
    pub destination: Address,
    pub packages: Vec<PackageSpec>,
    pub label_format: LabelFormat,
}

/// Result of a successful label purchase.
#[derive(Debug, Clone)]
pub struct PurchasedLabel {
    pub tracking_number: String,
    pub label_data: Vec<u8>,
    pub label_format: LabelFormat,
    pub cost: Money,
    pub currency: String,
}
