//! Carrier adapters.
//!
//! [`CarrierClient`] is the capability contract every adapter
//! implements: configuration probe, rate quoting, label purchase.
//! [`UpsClient`] and [`UspsClient`] talk to the real carrier HTTP
//! APIs; [`MockCarrier`] is the configurable test double. Each HTTP
//! client owns a [`TokenCache`] holding its OAuth bearer credential.

mod client;
mod error;
mod mock;
mod token;
mod types;
mod ups;
mod usps;

pub use client::CarrierClient;
pub use error::{CarrierError, Result};
pub use mock::MockCarrier;
pub use token::TokenCache;
pub use types::{PurchasedLabel, RateOffer, RateRequest, ShipmentRequest};
pub use ups::{UpsClient, UpsConfig};
pub use usps::{UspsClient, UspsConfig};
