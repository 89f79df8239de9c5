//! # Sequence Generator
//!
//! Named durable counters producing strictly increasing integers with
//! at-most-one-owner semantics under concurrency.
//!
//! ## How uniqueness is guaranteed
//! `next_value` runs a single atomic read-increment-write:
//!
//! ```sql
//! UPDATE sequences SET current_value = current_value + 1
//! WHERE name = ?1 RETURNING current_value
//! ```
//!
//! executed inside the *caller's* transaction. SQLite admits one writer at
//! a time, so no two transactions can both observe the same pre-increment
//! value. A rolled-back caller rolls the increment back too; if the
//! rollback races a later successful increment, the skipped value becomes
//! a gap; gaps are tolerated, duplicates are not.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Sequence backing sale receipt numbers.
pub const RECEIPT_SEQUENCE: &str = "receipt_number";

/// Sequence backing return numbers.
pub const RETURN_SEQUENCE: &str = "return_number";

/// Atomically increments the named sequence and returns the new value.
///
/// Must be called inside the unit of work that consumes the value, so an
/// aborted operation never publishes a receipt number.
pub async fn next_value(conn: &mut SqliteConnection, name: &str) -> DbResult<i64> {
    let now = Utc::now();

    // Lazily create the counter row on first use.
    sqlx::query(
        "INSERT INTO sequences (name, current_value, created_at, updated_at)
         VALUES (?1, 0, ?2, ?2)
         ON CONFLICT(name) DO NOTHING",
    )
    .bind(name)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let value: i64 = sqlx::query_scalar(
        "UPDATE sequences
         SET current_value = current_value + 1, updated_at = ?2
         WHERE name = ?1
         RETURNING current_value",
    )
    .bind(name)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    debug!(sequence = name, value, "Sequence advanced");
    Ok(value)
}

/// Reads the current value of a sequence without advancing it.
/// A sequence that has never been used reads as 0.
pub async fn current_value(pool: &SqlitePool, name: &str) -> DbResult<i64> {
    let value: Option<i64> =
        sqlx::query_scalar("SELECT current_value FROM sequences WHERE name = ?1")
            .bind(name)
            .fetch_optional(pool)
            .await?;

    Ok(value.unwrap_or(0))
}

/// Administrative correction: sets the named sequence to the given value.
/// Not part of any sale flow; the next `next_value` returns `value + 1`.
pub async fn reset_value(pool: &SqlitePool, name: &str, value: i64) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO sequences (name, current_value, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(name) DO UPDATE SET current_value = ?2, updated_at = ?3",
    )
    .bind(name)
    .bind(value)
    .bind(now)
    .execute(pool)
    .await?;

    debug!(sequence = name, value, "Sequence reset");
    Ok(())
}
