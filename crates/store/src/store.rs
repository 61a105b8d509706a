use async_trait::async_trait;
use common::{Money, OrderId, ProductId, ShipmentId, Sku};
use domain::{
    Address, LedgerEntry, NewLedgerEntry, NewShipment, Order, OrderStatus, Product, Shipment,
};

use crate::Result;

/// Input for the idempotent order upsert.
///
/// `external_id` is the upstream idempotency key: replays update the
/// existing order in place instead of duplicating it. The local status
/// is never overwritten by a replay; new orders start `Pending`.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub external_id: String,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: Address,
    pub total: Money,
    pub currency: String,
    pub items: Vec<OrderItemDraft>,
}

/// One line of an [`OrderDraft`], keyed by the upstream line id.
///
/// The product link is resolved by SKU at upsert time and stays null
/// when no product matches.
#[derive(Debug, Clone)]
pub struct OrderItemDraft {
    pub external_line_id: String,
    pub sku: Sku,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Repository contract for the warehouse.
///
/// All implementations must be thread-safe; every method is an
/// independent atomic operation. Multi-step fulfillment writes go
/// through [`WarehouseStore::begin_fulfillment`] instead.
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    /// Creates or updates an order by its external id (replay-safe).
    /// Items are matched by external line id; product links are
    /// resolved by SKU.
    async fn upsert_order(&self, draft: OrderDraft) -> Result<Order>;

    /// Loads an order with its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an order by its upstream id.
    async fn get_order_by_external_id(&self, external_id: &str) -> Result<Option<Order>>;

    /// Lists all orders, most recently created first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Writes an already-validated status, guarded against concurrent
    /// writers. Callers must have obtained `next` from an
    /// [`OrderStatus`] transition method applied to `expected`; if the
    /// stored status is no longer `expected` (a fulfillment committed
    /// in between, say), nothing is written and
    /// [`StoreError::StatusConflict`] is returned.
    ///
    /// [`StoreError::StatusConflict`]: crate::StoreError::StatusConflict
    async fn set_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<()>;

    /// Inserts a new product.
    async fn insert_product(&self, product: Product) -> Result<()>;

    /// Loads a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Loads a product by SKU.
    async fn get_product_by_sku(&self, sku: &Sku) -> Result<Option<Product>>;

    /// Applies a stock movement: appends the ledger entry and updates
    /// the product's stock in one atomic step. Fails with
    /// [`StockConflict`](crate::StoreError::StockConflict) if the
    /// movement would drive stock negative. Returns the updated
    /// product.
    async fn adjust_stock(&self, entry: NewLedgerEntry) -> Result<Product>;

    /// Returns a product's full ledger, oldest first. Replaying it
    /// must reproduce the product's current stock.
    async fn ledger_for_product(&self, id: ProductId) -> Result<Vec<LedgerEntry>>;

    /// Loads a shipment by id.
    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>>;

    /// Lists the shipments recorded for an order.
    async fn shipments_for_order(&self, id: OrderId) -> Result<Vec<Shipment>>;

    /// Opens a fulfillment unit of work. See [`FulfillmentTx`].
    async fn begin_fulfillment(&self) -> Result<Box<dyn FulfillmentTx>>;
}

/// Explicit unit of work for the fulfillment transaction.
///
/// Contract: no write made through this handle is visible to anyone
/// until [`commit`](FulfillmentTx::commit) returns `Ok`. Any error
/// from a write, an explicit [`rollback`](FulfillmentTx::rollback), or
/// dropping the handle without committing discards every staged write.
/// `order_for_update` locks the order against concurrent fulfillment
/// for the lifetime of the transaction, so the status observed through
/// it cannot change underneath the caller.
#[async_trait]
pub trait FulfillmentTx: Send {
    /// Loads and locks an order for the duration of the transaction.
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Stages a shipment insert; returns the stamped record (with its
    /// generated id, `label_url` still unset).
    async fn insert_shipment(&mut self, shipment: NewShipment) -> Result<Shipment>;

    /// Backfills the shipment's self-referential label URL.
    async fn set_label_url(&mut self, id: ShipmentId, url: &str) -> Result<()>;

    /// Stages a stock decrement. Fails with `StockConflict` when the
    /// product's staged stock is below `quantity`.
    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<()>;

    /// Stages an inventory ledger append.
    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<()>;

    /// Stages an order status write (already validated by the state
    /// machine).
    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()>;

    /// Atomically publishes every staged write.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every staged write.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
