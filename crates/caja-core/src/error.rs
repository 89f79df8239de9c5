//! # Error Types
//!
//! Business-rule errors for the sales/inventory ledger.
//!
//! ## Design Principles
//! 1. `thiserror` derive macros, not manual impls
//! 2. Every variant carries enough context to render a user-facing message
//!    (ids, available quantities, totals)
//! 3. Errors are enum variants, never strings
//! 4. Business failures are ordinary return values: insufficient stock and
//!    payment shortfalls are expected outcomes, not panics

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations. Every one of these is detected before commit
/// and causes the whole unit of work to roll back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product ID doesn't exist in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product exists but has been deactivated.
    #[error("Product is inactive: {sku} ({id})")]
    ProductInactive { id: String, sku: String },

    /// Not enough stock and negative stock is disallowed by store policy.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Amount paid does not cover the sale total.
    #[error("Insufficient payment: total {total_cents} cents, paid {paid_cents} cents")]
    InsufficientPayment { total_cents: i64, paid_cents: i64 },

    /// Sale ID doesn't exist.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// The sale is already voided; voiding twice is rejected, not silently
    /// accepted, and returns against a voided sale are refused.
    #[error("Sale {0} is already voided")]
    AlreadyVoided(String),

    /// Requested return quantity exceeds what is still returnable.
    #[error("Return quantity {requested} for product {product_id} exceeds returnable {available}")]
    ExcessiveReturnQuantity {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// The product was never part of the sale being returned against.
    #[error("Product {product_id} is not part of sale {sale_id}")]
    ItemNotInSale { sale_id: String, product_id: String },

    /// A negative amount where none is allowed.
    #[error("{field} cannot be negative (got {cents} cents)")]
    InvalidAmount { field: &'static str, cents: i64 },

    /// Malformed or missing input, rejected before a unit of work opens.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation failures. These never reach the database.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: &'static str, min: i64, max: i64 },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
