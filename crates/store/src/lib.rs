//! Persistence for the warehouse system.
//!
//! [`WarehouseStore`] is the repository contract; [`FulfillmentTx`] is
//! the explicit unit of work the fulfillment coordinator drives. Two
//! implementations share the contract: [`InMemoryStore`] for tests and
//! development, [`PostgresStore`] for deployments.

mod error;
mod memory;
mod postgres;
mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{FulfillmentTx, OrderDraft, OrderItemDraft, WarehouseStore};
