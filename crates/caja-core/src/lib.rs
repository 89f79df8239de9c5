//! # caja-core: Pure Business Logic for the Caja Ledger
//!
//! This crate is the **heart** of the sales/inventory ledger. It contains
//! all business arithmetic and rules as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Caja Architecture                          │
//! │                                                                 │
//! │  Caller (HTTP layer, desktop shell; out of scope)               │
//! │       │                                                         │
//! │  ┌────▼────────────────────────────────────────────────────┐   │
//! │  │              ★ caja-core (THIS CRATE) ★                 │   │
//! │  │                                                         │   │
//! │  │  ┌────────┐ ┌─────────┐ ┌────────┐ ┌────────────────┐  │   │
//! │  │  │ money  │ │ pricing │ │ types  │ │ validation     │  │   │
//! │  │  │ Money  │ │ carts,  │ │ Sale   │ │ preconditions  │  │   │
//! │  │  │ rates  │ │ tax     │ │ Ledger │ │                │  │   │
//! │  │  └────────┘ └─────────┘ └────────┘ └────────────────┘  │   │
//! │  │                                                         │   │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS     │   │
//! │  └────┬────────────────────────────────────────────────────┘   │
//! │       │                                                         │
//! │  ┌────▼────────────────────────────────────────────────────┐   │
//! │  │           caja-db (SQLite ledger + engine)              │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, always
//! 2. **Integer Money**: cents (i64) and basis points, never floats
//! 3. **Explicit Errors**: typed enums, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{DiscountRate, Money, TaxRate};
pub use pricing::{price_cart, CartTotals, LineInput, PricedLine};
pub use types::*;
