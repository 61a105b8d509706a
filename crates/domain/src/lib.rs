//! Domain layer for the warehouse system.
//!
//! Pure types and logic with no I/O: the order status state machine,
//! order and order-item snapshots synced from the upstream platform,
//! products, the append-only inventory ledger, shipments and label
//! formats, and shipping package estimation.

pub mod error;
pub mod inventory;
pub mod order;
pub mod package;
pub mod product;
pub mod shipment;

pub use error::{OrderError, StockShortage};
pub use inventory::{LedgerEntry, LedgerEntryKind, NewLedgerEntry, reconcile};
pub use order::{Address, Order, OrderItem, OrderStatus};
pub use package::{MIN_PACKAGE_WEIGHT_LB, PackageSpec};
pub use product::{Dimensions, Product};
pub use shipment::{LabelFormat, NewShipment, Shipment};
