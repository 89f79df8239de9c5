//! # Repository Helpers
//!
//! Row-level insert/fetch helpers, generic over `sqlx::Executor` so the
//! same query serves a pooled read (`&SqlitePool`) and an in-transaction
//! access (`&mut SqliteConnection`).

pub mod product;
pub mod sale;
pub mod store;
