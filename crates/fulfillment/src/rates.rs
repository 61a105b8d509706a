use std::sync::Arc;
use std::time::Duration;

use carriers::{CarrierClient, RateOffer, RateRequest};
use common::Money;
use domain::{Order, PackageSpec, Product};
use futures_util::future::join_all;
use store::WarehouseStore;

use crate::{FulfillmentError, Result};

/// Budget for one carrier's rate call. A carrier that has not settled
/// by then contributes an advisory instead of stalling the merge.
const PER_CARRIER_TIMEOUT: Duration = Duration::from_secs(10);

/// Merged rate response. `live` is false only when zero carriers are
/// configured and the offers are the deterministic placeholder table.
#[derive(Debug)]
pub struct RatesOutcome {
    pub offers: Vec<RateOffer>,
    pub advisories: Vec<String>,
    pub live: bool,
}

/// Fans a rate request out to every carrier and merges the results.
///
/// Carriers never block each other: every call is issued concurrently
/// and the merge waits for all of them to settle. A failing or
/// unconfigured carrier contributes an advisory string instead of
/// aborting the request.
pub struct RateAggregator {
    store: Arc<dyn WarehouseStore>,
    carriers: Vec<Arc<dyn CarrierClient>>,
}

impl RateAggregator {
    pub fn new(store: Arc<dyn WarehouseStore>, carriers: Vec<Arc<dyn CarrierClient>>) -> Self {
        Self { store, carriers }
    }

    /// Quotes every configured carrier for the given order.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn get_rates(&self, order: &Order) -> Result<RatesOutcome> {
        let started = std::time::Instant::now();
        let outcome = self.get_rates_inner(order).await;
        metrics::histogram!("rates_request_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn get_rates_inner(&self, order: &Order) -> Result<RatesOutcome> {
        let package = self.estimate_package(order).await?;
        let request = RateRequest {
            destination: order.shipping_address.clone(),
            packages: vec![package],
        };

        let mut advisories = Vec::new();
        let mut configured = Vec::new();
        for client in &self.carriers {
            if client.is_configured() {
                configured.push(Arc::clone(client));
            } else {
                advisories.push(format!("{}: not configured", client.name()));
            }
        }

        if configured.is_empty() {
            metrics::counter!("rates_placeholder_served").increment(1);
            tracing::warn!("no carriers configured; serving placeholder rates");
            return Ok(RatesOutcome {
                offers: placeholder_offers(),
                advisories,
                live: false,
            });
        }

        let calls = configured.iter().map(|client| {
            let client = Arc::clone(client);
            let request = &request;
            async move {
                let result =
                    tokio::time::timeout(PER_CARRIER_TIMEOUT, client.get_rates(request)).await;
                (client.name(), result)
            }
        });

        let mut offers = Vec::new();
        for (name, result) in join_all(calls).await {
            match result {
                Ok(Ok(mut carrier_offers)) => offers.append(&mut carrier_offers),
                Ok(Err(err)) => {
                    tracing::warn!(carrier = name, error = %err, "carrier rate call failed");
                    advisories.push(format!("{name}: {err}"));
                }
                Err(_) => {
                    tracing::warn!(carrier = name, "carrier rate call timed out");
                    advisories.push(format!("{name}: timed out"));
                }
            }
        }

        if offers.is_empty() {
            metrics::counter!("rates_exhausted").increment(1);
            return Err(FulfillmentError::NoRatesAvailable { advisories });
        }

        offers.sort_by_key(|offer| offer.price.cents());
        Ok(RatesOutcome {
            offers,
            advisories,
            live: true,
        })
    }

    /// Same package estimation as fulfillment: summed weights floored
    /// at the minimum, per-axis maximum dimensions. Items without a
    /// product link contribute nothing here; fulfillment itself will
    /// reject them.
    async fn estimate_package(&self, order: &Order) -> Result<PackageSpec> {
        let mut line_products: Vec<(Product, u32)> = Vec::new();
        for item in &order.items {
            let Some(product_id) = item.product_id else {
                continue;
            };
            if let Some(product) = self.store.get_product(product_id).await? {
                line_products.push((product, item.quantity));
            }
        }
        Ok(PackageSpec::estimate(
            line_products.iter().map(|(product, qty)| (product, *qty)),
        ))
    }
}

/// Deterministic non-live rate table for environments with no carrier
/// credentials at all.
fn placeholder_offers() -> Vec<RateOffer> {
    vec![
        RateOffer {
            carrier: "Demo".to_string(),
            service_code: "GROUND".to_string(),
            service_name: "Demo Ground (not live)".to_string(),
            price: Money::from_cents(899),
            currency: "USD".to_string(),
            estimated_days: Some(5),
            estimated_delivery_date: None,
        },
        RateOffer {
            carrier: "Demo".to_string(),
            service_code: "2DAY".to_string(),
            service_name: "Demo 2-Day (not live)".to_string(),
            price: Money::from_cents(1999),
            currency: "USD".to_string(),
            estimated_days: Some(2),
            estimated_delivery_date: None,
        },
        RateOffer {
            carrier: "Demo".to_string(),
            service_code: "OVERNIGHT".to_string(),
            service_name: "Demo Overnight (not live)".to_string(),
            price: Money::from_cents(3999),
            currency: "USD".to_string(),
            estimated_days: Some(1),
            estimated_delivery_date: None,
        },
    ]
}
