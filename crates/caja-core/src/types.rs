//! # Domain Types
//!
//! Core domain types for the sales/inventory ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                            │
//! │                                                                 │
//! │  Product (reference data) ──► SaleItem (frozen snapshot)        │
//! │                                    │                            │
//! │  Sale ◄────────────────────────────┘                            │
//! │   │  receipt_number from the `receipt_number` sequence          │
//! │   ├──► Return ──► ReturnItem                                    │
//! │   └──► InventoryMovement (SALE / VOID / RETURN)                 │
//! │                                                                 │
//! │  InventoryMovement is the append-only ledger: the only record   │
//! │  of stock changes, and the only path that mutates stock.        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `SaleItem` freezes the product's sku/name/price/tax-rate at sale time,
//! so later product edits never retroactively change historical receipts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{DiscountRate, Money, TaxRate};

// =============================================================================
// Product (reference data, externally owned)
// =============================================================================

/// A product as read from the catalog collaborator.
///
/// `current_stock` is only ever changed by the inventory ledger; no other
/// component writes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Unit sale price in cents.
    pub sale_price_cents: i64,

    /// Unit cost in cents (for margin and entry costing).
    pub cost_price_cents: Option<i64>,

    /// Tax rate in basis points (1900 = 19%).
    pub tax_rate_bps: i64,

    /// Whether the product can be sold (soft delete).
    pub is_active: bool,

    /// Current stock level.
    pub current_stock: i64,

    /// Threshold below which the product counts as low stock.
    pub min_stock: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the sale price as Money.
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    /// Returns the tax rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// Store Policy (reference data, externally owned)
// =============================================================================

/// The slice of store configuration the ledger consults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StorePolicy {
    /// Whether a SALE movement may drive stock below zero.
    pub allow_negative_stock: bool,
}

// =============================================================================
// Sale Status / Payment Method
// =============================================================================

/// The status of a sale transaction.
///
/// A sale is created `Completed`; compensations move it to `PartialReturn`
/// (some quantity returned) or `Voided` (cancelled, or everything returned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Completed,
    Voided,
    PartialReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Mixed,
}

// =============================================================================
// Inventory Movement
// =============================================================================

/// What caused a stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Entry,
    Sale,
    Adjustment,
    Return,
    Void,
}

/// The record type a movement points back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceKind {
    Sale,
    Return,
}

/// One immutable entry in the inventory ledger.
///
/// Invariant: `stock_after = stock_before + quantity`, and for any product
/// the movements ordered by creation time reconstruct the full stock
/// history with no gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryMovement {
    pub id: String,
    pub product_id: String,
    /// Actor who caused the movement.
    pub user_id: String,
    pub kind: MovementKind,
    /// Signed stock delta: positive for ENTRY/RETURN/VOID, negative for SALE,
    /// as given for ADJUSTMENT.
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    /// Unit cost in cents, when known (ENTRY movements).
    pub unit_cost_cents: Option<i64>,
    pub reason: Option<String>,
    /// Sale or return that caused this movement.
    pub reference_id: Option<String>,
    pub reference_kind: Option<ReferenceKind>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale transaction.
///
/// Invariants: `total = subtotal + tax_amount`; `subtotal` is already net of
/// item-level and global discounts; `change = max(0, amount_paid - total)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Strictly increasing integer from the `receipt_number` sequence.
    pub receipt_number: i64,
    pub user_id: String,
    pub status: SaleStatus,
    /// Net of item and global discounts.
    pub subtotal_cents: i64,
    /// Total discount granted (item discounts + global discount).
    pub discount_cents: i64,
    /// Global discount rate in basis points.
    pub discount_bps: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid_cents: i64,
    pub change_cents: i64,
    pub notes: Option<String>,
    pub void_reason: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in a sale, frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub product_sku: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Unit cost in cents at time of sale (frozen).
    pub cost_price_cents: Option<i64>,
    /// Tax rate in basis points at time of sale (frozen).
    pub tax_rate_bps: i64,
    pub quantity: i64,
    /// Item-level discount rate in basis points.
    pub discount_bps: i64,
    /// Item-level discount amount in cents.
    pub discount_cents: i64,
    /// Gross line amount: `unit_price × quantity`.
    pub subtotal_cents: i64,
    /// Tax on the post-discount line value.
    pub tax_cents: i64,
    /// Line total: post-discount value plus tax.
    pub total_cents: i64,
    /// Quantity returned so far. Mutated only by return processing,
    /// never exceeds `quantity`.
    pub returned_qty: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Quantity still eligible for return.
    #[inline]
    pub fn returnable_qty(&self) -> i64 {
        self.quantity - self.returned_qty
    }
}

/// A sale together with its ordered line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Return
// =============================================================================

/// A post-sale reversal of specific line items, distinct from a void.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Return {
    pub id: String,
    /// Strictly increasing integer from the `return_number` sequence.
    pub return_number: i64,
    pub sale_id: String,
    pub user_id: String,
    pub reason: String,
    pub total_refund_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReturnItem {
    pub id: String,
    pub return_id: String,
    pub sale_item_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price at original sale time; refunds never use current prices.
    pub unit_price_cents: i64,
    pub refund_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// A return together with its items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnWithItems {
    pub return_record: Return,
    pub items: Vec<ReturnItem>,
}

// =============================================================================
// Requests
// =============================================================================

/// One requested cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
    /// Item discount percentage in [0, 100].
    pub discount_percent: f64,
}

/// A request to create a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleRequest {
    pub items: Vec<SaleLineRequest>,
    pub payment_method: PaymentMethod,
    pub amount_paid_cents: i64,
    /// Global discount percentage in [0, 100], applied across all lines.
    pub discount_percent: f64,
    pub notes: Option<String>,
}

/// One requested return line, keyed by the product sold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

impl SaleLineRequest {
    /// The line's discount as a rate. Range is checked by validation before
    /// any unit of work opens; clamping here is belt and suspenders.
    pub fn discount(&self) -> DiscountRate {
        DiscountRate::from_percent_clamped(self.discount_percent)
    }
}

// =============================================================================
// Receipt formatting
// =============================================================================

/// Default display prefix for receipt numbers.
pub const RECEIPT_PREFIX: &str = "R";

/// Default display prefix for return numbers.
pub const RETURN_PREFIX: &str = "D";

/// Default zero padding for formatted sequence numbers.
pub const SEQUENCE_PADDING: usize = 8;

/// Renders a sequence value as the externally visible document number,
/// e.g. `format_document_number("R", 42)` → `"R00000042"`.
///
/// The stored value stays an integer; formatting is display-only.
pub fn format_document_number(prefix: &str, value: i64) -> String {
    format!("{prefix}{value:0width$}", width = SEQUENCE_PADDING)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_number_formatting() {
        assert_eq!(format_document_number(RECEIPT_PREFIX, 42), "R00000042");
        assert_eq!(format_document_number(RETURN_PREFIX, 1), "D00000001");
        assert_eq!(format_document_number(RECEIPT_PREFIX, 123_456_789), "R123456789");
    }

    #[test]
    fn returnable_qty_accounts_for_prior_returns() {
        let item = SaleItem {
            id: "i".into(),
            sale_id: "s".into(),
            product_id: "p".into(),
            product_sku: "SKU".into(),
            product_name: "Thing".into(),
            unit_price_cents: 1000,
            cost_price_cents: None,
            tax_rate_bps: 1900,
            quantity: 5,
            discount_bps: 0,
            discount_cents: 0,
            subtotal_cents: 5000,
            tax_cents: 950,
            total_cents: 5950,
            returned_qty: 3,
            created_at: Utc::now(),
        };
        assert_eq!(item.returnable_qty(), 2);
    }
}
