use carriers::CarrierError;
use common::OrderId;
use domain::{OrderStatus, StockShortage};
use store::StoreError;
use thiserror::Error;

/// Errors returned by fulfillment and rate aggregation.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The order has already been shipped.
    #[error("order {0} has already been shipped")]
    AlreadyShipped(OrderId),

    /// The order has been cancelled.
    #[error("order {0} has been cancelled")]
    Cancelled(OrderId),

    /// The order is in a status that does not permit the operation.
    #[error("order {order_id} is {status} and cannot be fulfilled")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// One or more items cannot be covered by current stock. Every
    /// offending item is listed, not just the first.
    #[error("insufficient stock: {}", format_shortages(.0))]
    InsufficientStock(Vec<StockShortage>),

    /// The requested carrier has no credentials (or does not exist).
    #[error("carrier {0} is not configured")]
    CarrierNotConfigured(String),

    /// The carrier rejected or failed the call. Never retried here.
    #[error(transparent)]
    Carrier(CarrierError),

    /// Every configured carrier failed or returned nothing.
    #[error("no rates available: {}", advisories.join("; "))]
    NoRatesAvailable { advisories: Vec<String> },

    /// The local transaction failed after the label was purchased.
    /// The tracking number identifies the orphaned-but-paid label for
    /// manual reconciliation with the carrier.
    #[error(
        "fulfillment persistence failed after purchasing label {tracking_number} from {carrier}: {source}"
    )]
    Persistence {
        carrier: String,
        tracking_number: String,
        source: StoreError,
    },

    /// A store failure before any label was purchased.
    #[error(transparent)]
    Store(StoreError),
}

fn format_shortages(shortages: &[StockShortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, key } => FulfillmentError::NotFound { entity, key },
            other => FulfillmentError::Store(other),
        }
    }
}

impl From<CarrierError> for FulfillmentError {
    fn from(err: CarrierError) -> Self {
        match err {
            CarrierError::NotConfigured(name) => {
                FulfillmentError::CarrierNotConfigured(name.to_string())
            }
            other => FulfillmentError::Carrier(other),
        }
    }
}

/// Result type for fulfillment operations.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
