//! Shared types used across the warehouse system.
//!
//! Typed identifiers prevent mixing up the different UUID-based keys
//! (orders, products, shipments, users), and [`Money`] keeps all prices
//! in integer cents.

mod money;
mod types;

pub use money::Money;
pub use types::{OrderId, ProductId, ShipmentId, Sku, UserId};
