use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use domain::LabelFormat;

use crate::client::CarrierClient;
use crate::types::{PurchasedLabel, RateOffer, RateRequest, ShipmentRequest};
use crate::{CarrierError, Result};

#[derive(Debug)]
struct MockState {
    configured: bool,
    offers: Vec<RateOffer>,
    fail_rates: bool,
    rate_delay: Option<Duration>,
    fail_purchase: bool,
    purchases: Vec<String>,
    next_tracking: u32,
}

/// Configurable carrier double for tests.
///
/// Quotes a fixed offer list, mints sequential tracking numbers, and
/// can be told to fail either operation.
#[derive(Debug, Clone)]
pub struct MockCarrier {
    name: &'static str,
    state: Arc<RwLock<MockState>>,
}

impl MockCarrier {
    pub fn new(name: &'static str) -> Self {
        let offers = vec![
            RateOffer {
                carrier: name.to_string(),
                service_code: "03".to_string(),
                service_name: format!("{name} Ground"),
                price: Money::from_cents(1235),
                currency: "USD".to_string(),
                estimated_days: Some(5),
                estimated_delivery_date: None,
            },
            RateOffer {
                carrier: name.to_string(),
                service_code: "02".to_string(),
                service_name: format!("{name} 2nd Day"),
                price: Money::from_cents(2890),
                currency: "USD".to_string(),
                estimated_days: Some(2),
                estimated_delivery_date: None,
            },
        ];

        Self {
            name,
            state: Arc::new(RwLock::new(MockState {
                configured: true,
                offers,
                fail_rates: false,
                rate_delay: None,
                fail_purchase: false,
                purchases: Vec::new(),
                next_tracking: 0,
            })),
        }
    }

    /// Creates a carrier that reports itself unconfigured.
    pub fn unconfigured(name: &'static str) -> Self {
        let carrier = Self::new(name);
        carrier.state.write().unwrap().configured = false;
        carrier
    }

    /// Replaces the offers returned by `get_rates`.
    pub fn set_offers(&self, offers: Vec<RateOffer>) {
        self.state.write().unwrap().offers = offers;
    }

    /// Configures `get_rates` to fail.
    pub fn set_fail_rates(&self, fail: bool) {
        self.state.write().unwrap().fail_rates = fail;
    }

    /// Delays every `get_rates` call, for timeout testing.
    pub fn set_rate_delay(&self, delay: Duration) {
        self.state.write().unwrap().rate_delay = Some(delay);
    }

    /// Configures `create_shipment` to fail.
    pub fn set_fail_purchase(&self, fail: bool) {
        self.state.write().unwrap().fail_purchase = fail;
    }

    /// Service codes of every label purchased so far.
    pub fn purchases(&self) -> Vec<String> {
        self.state.read().unwrap().purchases.clone()
    }
}

#[async_trait]
impl CarrierClient for MockCarrier {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_configured(&self) -> bool {
        self.state.read().unwrap().configured
    }

    async fn get_rates(&self, _request: &RateRequest) -> Result<Vec<RateOffer>> {
        let delay = self.state.read().unwrap().rate_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.read().unwrap();
        if !state.configured {
            return Err(CarrierError::NotConfigured(self.name));
        }
        if state.fail_rates {
            return Err(CarrierError::Api {
                status: 500,
                body: "rate engine unavailable".to_string(),
            });
        }
        Ok(state.offers.clone())
    }

    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<PurchasedLabel> {
        let mut state = self.state.write().unwrap();
        if !state.configured {
            return Err(CarrierError::NotConfigured(self.name));
        }
        if state.fail_purchase {
            return Err(CarrierError::Api {
                status: 502,
                body: "label purchase rejected".to_string(),
            });
        }

        let cost = state
            .offers
            .iter()
            .find(|offer| offer.service_code == request.service_code)
            .map(|offer| offer.price)
            .unwrap_or_else(|| Money::from_cents(1000));

        state.next_tracking += 1;
        let tracking_number = format!("1Z{}{:08}", self.name, state.next_tracking);
        let label_data = format!("LABEL:{tracking_number}").into_bytes();
        state.purchases.push(request.service_code.clone());

        Ok(PurchasedLabel {
            tracking_number,
            label_data,
            label_format: LabelFormat::Png,
            cost,
            currency: "USD".to_string(),
        })
    }
}
