//! Orders synced from the upstream e-commerce platform.

mod status;

pub use status::OrderStatus;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, Sku};
use serde::{Deserialize, Serialize};

/// Shipping destination snapshot taken at sync time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

/// A line item snapshot.
///
/// `external_line_id` is the upstream idempotency key (unique per
/// order). `product_id` is `None` when no product with a matching SKU
/// existed in inventory at sync time — a tolerated state that blocks
/// fulfillment until resolved, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub external_line_id: String,
    pub sku: Sku,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub product_id: Option<ProductId>,
}

impl OrderItem {
    /// Total price for this line (quantity × unit price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order as held locally.
///
/// Created and updated only by the upstream sync (webhook ingestion);
/// `status` is mutated only through [`OrderStatus`] transitions, with
/// the `Shipped` write owned by the fulfillment transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,

    /// Upstream order id — the idempotency key for sync.
    pub external_id: String,

    /// Human order number, e.g. `#1001`.
    pub order_number: String,

    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: Address,
    pub status: OrderStatus,
    pub total: Money,
    pub currency: String,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the item with the given upstream line id, if present.
    pub fn item_by_external_line_id(&self, external_line_id: &str) -> Option<&OrderItem> {
        self.items
            .iter()
            .find(|i| i.external_line_id == external_line_id)
    }

    /// Items that still lack a product link.
    pub fn unlinked_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|i| i.product_id.is_none())
    }

    /// Total quantity across all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}
