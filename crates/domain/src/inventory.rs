//! Append-only inventory ledger.
//!
//! The ledger is the source of truth for stock: every stock mutation
//! appends an entry, and `Product.stock` must equal the sum of the
//! signed quantities of that product's entries at all times.

use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of inventory movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEntryKind {
    /// Stock received from a supplier (positive delta).
    Received,
    /// Stock shipped against an order (negative delta).
    Shipped,
    /// Manual correction (either sign).
    Adjusted,
    /// Customer return restocked (positive delta).
    Returned,
}

impl LedgerEntryKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryKind::Received => "Received",
            LedgerEntryKind::Shipped => "Shipped",
            LedgerEntryKind::Adjusted => "Adjusted",
            LedgerEntryKind::Returned => "Returned",
        }
    }

    /// Parses a kind name produced by [`LedgerEntryKind::as_str`].
    pub fn parse(s: &str) -> Option<LedgerEntryKind> {
        match s {
            "Received" => Some(LedgerEntryKind::Received),
            "Shipped" => Some(LedgerEntryKind::Shipped),
            "Adjusted" => Some(LedgerEntryKind::Adjusted),
            "Returned" => Some(LedgerEntryKind::Returned),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable ledger entry. Created, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub product_id: ProductId,
    /// Signed stock delta.
    pub quantity: i64,
    pub kind: LedgerEntryKind,
    pub note: String,
    pub actor: UserId,
    pub recorded_at: DateTime<Utc>,
}

/// A ledger entry about to be appended.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub product_id: ProductId,
    pub quantity: i64,
    pub kind: LedgerEntryKind,
    pub note: String,
    pub actor: UserId,
}

impl NewLedgerEntry {
    /// Stamps the entry with an id and timestamp.
    pub fn into_entry(self) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            product_id: self.product_id,
            quantity: self.quantity,
            kind: self.kind,
            note: self.note,
            actor: self.actor,
            recorded_at: Utc::now(),
        }
    }
}

/// Replays a product's ledger, returning the stock it implies.
///
/// Used to check the reconciliation invariant: the result must match
/// the product's `stock` field.
pub fn reconcile<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> i64 {
    entries.into_iter().map(|e| e.quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(product_id: ProductId, quantity: i64, kind: LedgerEntryKind) -> LedgerEntry {
        NewLedgerEntry {
            product_id,
            quantity,
            kind,
            note: String::new(),
            actor: UserId::new(),
        }
        .into_entry()
    }

    #[test]
    fn kind_roundtrip() {
        for kind in [
            LedgerEntryKind::Received,
            LedgerEntryKind::Shipped,
            LedgerEntryKind::Adjusted,
            LedgerEntryKind::Returned,
        ] {
            assert_eq!(LedgerEntryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(LedgerEntryKind::parse("Misplaced"), None);
    }

    #[test]
    fn reconcile_sums_signed_deltas() {
        let product_id = ProductId::new();
        let entries = vec![
            entry(product_id, 10, LedgerEntryKind::Received),
            entry(product_id, -3, LedgerEntryKind::Shipped),
            entry(product_id, -1, LedgerEntryKind::Adjusted),
            entry(product_id, 2, LedgerEntryKind::Returned),
        ];
        assert_eq!(reconcile(&entries), 8);
    }

    #[test]
    fn reconcile_empty_is_zero() {
        assert_eq!(reconcile(&[]), 0);
    }
}
