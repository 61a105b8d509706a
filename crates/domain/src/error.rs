//! Domain error types.

use common::Sku;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by order state transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The requested transition is not legal from the current status.
    #[error("cannot {action} an order in {from} status")]
    InvalidTransition {
        from: OrderStatus,
        action: &'static str,
    },
}

/// One item of an aggregated insufficient-stock report.
///
/// `available` is `None` when the order item has no matching product
/// in inventory at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortage {
    pub sku: Sku,
    pub required: u32,
    pub available: Option<u32>,
}

impl std::fmt::Display for StockShortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.available {
            Some(available) => write!(
                f,
                "{}: need {}, have {}",
                self.sku, self.required, available
            ),
            None => write!(f, "{}: need {}, not in system", self.sku, self.required),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortage_display_with_stock() {
        let s = StockShortage {
            sku: Sku::new("WIDGET-1"),
            required: 3,
            available: Some(1),
        };
        assert_eq!(s.to_string(), "WIDGET-1: need 3, have 1");
    }

    #[test]
    fn shortage_display_unlinked() {
        let s = StockShortage {
            sku: Sku::new("GHOST-9"),
            required: 2,
            available: None,
        };
        assert_eq!(s.to_string(), "GHOST-9: need 2, not in system");
    }
}
