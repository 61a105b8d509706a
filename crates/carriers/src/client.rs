use async_trait::async_trait;

use crate::types::{PurchasedLabel, RateRequest, ShipmentRequest};
use crate::{RateOffer, Result};

/// Capability contract for a carrier adapter.
#[async_trait]
pub trait CarrierClient: Send + Sync {
    /// Carrier name as shown to operators and stored on shipments.
    fn name(&self) -> &'static str;

    /// Whether credentials are present. Unconfigured clients never
    /// make network calls; rate aggregation skips them and label
    /// purchase fails fast.
    fn is_configured(&self) -> bool;

    /// Quotes every available service for the given destination and
    /// packages.
    async fn get_rates(&self, request: &RateRequest) -> Result<Vec<RateOffer>>;

    /// Purchases a label for one chosen service. Not retried on
    /// ambiguous failure; the caller surfaces the error as-is.
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<PurchasedLabel>;
}
