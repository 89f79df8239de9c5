//! # caja-db: SQLite Ledger and Transaction Engine
//!
//! Durable half of the Caja sales/inventory ledger: connection pooling,
//! embedded migrations, the append-only inventory ledger, durable
//! sequences and the transactional sale engine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Caller (HTTP layer, desktop shell; out of scope)               │
//! │       │                                                         │
//! │  ┌────▼────────────────────────────────────────────────────┐   │
//! │  │              ★ caja-db (THIS CRATE) ★                   │   │
//! │  │                                                         │   │
//! │  │  engine ──► sequence ─┐                                 │   │
//! │  │    │                  ├──► one SQLite transaction       │   │
//! │  │    ├──► ledger ───────┤    per operation (WAL,          │   │
//! │  │    └──► repository ───┘    single writer)               │   │
//! │  │    │                                                    │   │
//! │  │    └──► audit (post-commit, fire-and-forget)            │   │
//! │  └────┬────────────────────────────────────────────────────┘   │
//! │       │ uses caja-core for all arithmetic and business rules    │
//! └───────┴─────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod sequence;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use audit::{AuditEvent, AuditSink, NullAuditSink, TracingAuditSink};
pub use engine::SaleEngine;
pub use error::{DbError, DbResult, LedgerError, LedgerResult};
pub use ledger::{MovementFilter, MovementRequest};
pub use pool::{Database, DbConfig};
