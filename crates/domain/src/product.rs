//! Products tracked in inventory.

use common::{ProductId, Sku};
use serde::{Deserialize, Serialize};

/// Physical dimensions in inches, used for shipping package estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Dimensions {
    pub length_in: f64,
    pub width_in: f64,
    pub height_in: f64,
}

/// A product in inventory.
///
/// `stock` is derived state: it must always equal the sum of signed
/// quantities in the product's ledger entries, and is only ever
/// written together with a ledger entry in the same transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: Sku,
    pub name: String,
    pub dimensions: Dimensions,
    pub weight_lb: f64,
    pub stock: i64,
    pub low_stock_threshold: i64,

    /// Upstream platform product id, when linked.
    #[serde(default)]
    pub platform_product_id: Option<String>,

    /// Upstream platform variant id, when linked.
    #[serde(default)]
    pub platform_variant_id: Option<String>,
}

impl Product {
    /// Returns true when stock has fallen to or below the threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_threshold
    }

    /// Stock available for a decrement, clamped at zero.
    pub fn available(&self) -> u32 {
        u32::try_from(self.stock.max(0)).unwrap_or(u32::MAX)
    }
}
