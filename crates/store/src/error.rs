use common::Sku;
use domain::OrderStatus;
use thiserror::Error;

/// Errors that can occur when interacting with the warehouse store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A stock decrement would drive stock negative. Inside a
    /// fulfillment transaction this aborts the whole unit of work.
    #[error("stock conflict for {sku}: requested {requested}, available {available}")]
    StockConflict {
        sku: Sku,
        requested: u32,
        available: i64,
    },

    /// A guarded status write found a different current status than
    /// the caller validated against. Nothing was written.
    #[error("order status is {actual}, expected {expected}")]
    StatusConflict {
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be interpreted (e.g. an unknown status
    /// string written by a newer version).
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Convenience constructor for [`StoreError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
