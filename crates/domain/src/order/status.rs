//! Order status state machine.

use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// Pending ◄──────┐
///    │ │         │ resume
///    │ ├──► OnHold ◄── Processing
///    │ │       │            │
///    │ └───────┼────────────┤──► Cancelled
///    │         │            │
///    └─────────┴────────────┴──► Shipped   (fulfillment only)
/// ```
///
/// `Shipped` is written exclusively by the fulfillment transaction;
/// every other transition goes through the methods below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order synced from the platform, awaiting fulfillment.
    #[default]
    Pending,

    /// Partially fulfilled upstream, still fulfillable here.
    Processing,

    /// A shipment has been recorded (terminal for fulfillment).
    Shipped,

    /// Manually held; reversible via resume.
    OnHold,

    /// Manually cancelled (terminal for fulfillment).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if a shipment may be created in this status.
    pub fn is_fulfillable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Returns true if the order can be placed on hold.
    pub fn can_hold(&self) -> bool {
        !matches!(self, OrderStatus::Shipped | OrderStatus::OnHold)
    }

    /// Returns true if the order can be resumed from hold.
    pub fn can_resume(&self) -> bool {
        matches!(self, OrderStatus::OnHold)
    }

    /// Returns true if the order can be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::OnHold
        )
    }

    /// Returns true if no further shipment may ever be created.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Cancelled)
    }

    /// Transition: manual hold.
    pub fn hold(self) -> Result<OrderStatus, OrderError> {
        if self.can_hold() {
            Ok(OrderStatus::OnHold)
        } else {
            Err(OrderError::InvalidTransition {
                from: self,
                action: "hold",
            })
        }
    }

    /// Transition: resume a held order back to `Pending`.
    pub fn resume(self) -> Result<OrderStatus, OrderError> {
        if self.can_resume() {
            Ok(OrderStatus::Pending)
        } else {
            Err(OrderError::InvalidTransition {
                from: self,
                action: "resume",
            })
        }
    }

    /// Transition: manual cancel.
    pub fn cancel(self) -> Result<OrderStatus, OrderError> {
        if self.can_cancel() {
            Ok(OrderStatus::Cancelled)
        } else {
            Err(OrderError::InvalidTransition {
                from: self,
                action: "cancel",
            })
        }
    }

    /// Transition: successful fulfillment. Only the fulfillment
    /// transaction calls this, with the order row locked.
    pub fn ship(self) -> Result<OrderStatus, OrderError> {
        if self.is_fulfillable() {
            Ok(OrderStatus::Shipped)
        } else {
            Err(OrderError::InvalidTransition {
                from: self,
                action: "ship",
            })
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::OnHold => "OnHold",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a status name produced by [`OrderStatus::as_str`].
    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "Pending" => Some(OrderStatus::Pending),
            "Processing" => Some(OrderStatus::Processing),
            "Shipped" => Some(OrderStatus::Shipped),
            "OnHold" => Some(OrderStatus::OnHold),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn only_pending_and_processing_are_fulfillable() {
        assert!(OrderStatus::Pending.is_fulfillable());
        assert!(OrderStatus::Processing.is_fulfillable());
        assert!(!OrderStatus::Shipped.is_fulfillable());
        assert!(!OrderStatus::OnHold.is_fulfillable());
        assert!(!OrderStatus::Cancelled.is_fulfillable());
    }

    #[test]
    fn hold_from_anything_but_shipped() {
        assert_eq!(OrderStatus::Pending.hold().unwrap(), OrderStatus::OnHold);
        assert_eq!(OrderStatus::Processing.hold().unwrap(), OrderStatus::OnHold);
        assert_eq!(OrderStatus::Cancelled.hold().unwrap(), OrderStatus::OnHold);
        assert!(OrderStatus::Shipped.hold().is_err());
        assert!(OrderStatus::OnHold.hold().is_err());
    }

    #[test]
    fn resume_only_from_hold() {
        assert_eq!(OrderStatus::OnHold.resume().unwrap(), OrderStatus::Pending);
        assert!(OrderStatus::Pending.resume().is_err());
        assert!(OrderStatus::Shipped.resume().is_err());
    }

    #[test]
    fn cancel_fails_when_shipped() {
        assert_eq!(
            OrderStatus::Pending.cancel().unwrap(),
            OrderStatus::Cancelled
        );
        assert_eq!(
            OrderStatus::Processing.cancel().unwrap(),
            OrderStatus::Cancelled
        );
        assert_eq!(
            OrderStatus::OnHold.cancel().unwrap(),
            OrderStatus::Cancelled
        );
        assert!(matches!(
            OrderStatus::Shipped.cancel(),
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Shipped,
                action: "cancel",
            })
        ));
        assert!(OrderStatus::Cancelled.cancel().is_err());
    }

    #[test]
    fn ship_only_from_fulfillable() {
        assert_eq!(OrderStatus::Pending.ship().unwrap(), OrderStatus::Shipped);
        assert_eq!(
            OrderStatus::Processing.ship().unwrap(),
            OrderStatus::Shipped
        );
        assert!(OrderStatus::Shipped.ship().is_err());
        assert!(OrderStatus::OnHold.ship().is_err());
        assert!(OrderStatus::Cancelled.ship().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Shipped.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::OnHold.is_terminal());
    }

    #[test]
    fn as_str_parse_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::OnHold,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("Unknown"), None);
    }
}
