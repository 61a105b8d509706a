//! Fulfillment orchestration.
//!
//! [`FulfillmentCoordinator`] drives the label-purchase-then-commit
//! protocol for a single order; [`RateAggregator`] fans a rate request
//! out to every configured carrier and merges the results;
//! [`PlatformNotifier`] is the post-commit upstream callback.

mod coordinator;
mod error;
mod notify;
mod rates;

pub use coordinator::{FulfillmentCoordinator, FulfillmentOutcome};
pub use error::{FulfillmentError, Result};
pub use notify::{HttpPlatformNotifier, InMemoryNotifier, NotifyError, PlatformNotifier};
pub use rates::{RateAggregator, RatesOutcome};
