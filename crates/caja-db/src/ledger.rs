//! # Inventory Ledger
//!
//! The append-only log of stock-affecting events, and the **single
//! authority** over `products.current_stock`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Every stock change, no exceptions:                             │
//! │                                                                 │
//! │  create_sale ──┐                                                │
//! │  void_sale ────┤                                                │
//! │  create_return ├──► record_movement ──► movement row INSERTED   │
//! │  add_entry ────┤         (here)         product stock UPDATED   │
//! │  adjust_stock ─┘                        (same transaction)      │
//! │                                                                 │
//! │  Invariant: stock_after = stock_before + delta, so summing a    │
//! │  product's deltas always reconstructs its current stock.        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `record_movement` runs inside the caller's unit of work; the write
//! intent acquired at transaction start guarantees the stock read here is
//! not stale.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, LedgerResult};
use caja_core::{CoreError, InventoryMovement, MovementKind, ReferenceKind};

/// A stock movement to record.
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub product_id: String,
    pub user_id: String,
    pub kind: MovementKind,
    /// Magnitude for ENTRY/SALE/RETURN/VOID; the signed delta itself
    /// for ADJUSTMENT.
    pub quantity: i64,
    pub unit_cost_cents: Option<i64>,
    pub reason: Option<String>,
    /// Sale or return that caused the movement.
    pub reference: Option<(String, ReferenceKind)>,
}

/// Records one movement and applies it to the product's stock.
///
/// ## Algorithm
/// 1. Read the product's current stock (consistent inside the caller's
///    unit of work)
/// 2. Derive the signed delta from the movement kind
/// 3. If the new stock would be negative and `allow_negative_stock` is
///    false, fail with `InsufficientStock` carrying the available quantity
/// 4. Insert the immutable movement row with stock-before/after
/// 5. Update the product's stock
///
/// Steps 4 and 5 are inseparable: a stock value without its movement row
/// (or vice versa) never becomes visible, because the caller's transaction
/// commits or rolls back both.
pub async fn record_movement(
    conn: &mut SqliteConnection,
    req: MovementRequest,
    allow_negative_stock: bool,
) -> LedgerResult<InventoryMovement> {
    let stock_before: Option<i64> =
        sqlx::query_scalar("SELECT current_stock FROM products WHERE id = ?1")
            .bind(&req.product_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?;

    let stock_before =
        stock_before.ok_or_else(|| CoreError::ProductNotFound(req.product_id.clone()))?;

    let delta = match req.kind {
        MovementKind::Entry | MovementKind::Return | MovementKind::Void => req.quantity.abs(),
        MovementKind::Sale => -req.quantity.abs(),
        MovementKind::Adjustment => req.quantity,
    };

    let stock_after = stock_before + delta;

    if stock_after < 0 && !allow_negative_stock {
        return Err(CoreError::InsufficientStock {
            product_id: req.product_id.clone(),
            available: stock_before,
            requested: delta.abs(),
        }
        .into());
    }

    let now = Utc::now();
    let (reference_id, reference_kind) = match &req.reference {
        Some((id, kind)) => (Some(id.clone()), Some(*kind)),
        None => (None, None),
    };

    let movement = InventoryMovement {
        id: Uuid::new_v4().to_string(),
        product_id: req.product_id.clone(),
        user_id: req.user_id.clone(),
        kind: req.kind,
        quantity: delta,
        stock_before,
        stock_after,
        unit_cost_cents: req.unit_cost_cents,
        reason: req.reason.clone(),
        reference_id,
        reference_kind,
        created_at: now,
    };

    sqlx::query(
        "INSERT INTO inventory_movements (
            id, product_id, user_id, kind, quantity,
            stock_before, stock_after, unit_cost_cents, reason,
            reference_id, reference_kind, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(&movement.user_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.stock_before)
    .bind(movement.stock_after)
    .bind(movement.unit_cost_cents)
    .bind(&movement.reason)
    .bind(&movement.reference_id)
    .bind(movement.reference_kind)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    sqlx::query("UPDATE products SET current_stock = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(&movement.product_id)
        .bind(stock_after)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

    debug!(
        product_id = %movement.product_id,
        kind = ?movement.kind,
        delta,
        stock_after,
        "Movement recorded"
    );

    Ok(movement)
}

// =============================================================================
// Movement history (Kardex)
// =============================================================================

/// Filters for a product's movement history.
#[derive(Debug, Clone)]
pub struct MovementFilter {
    pub kind: Option<MovementKind>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for MovementFilter {
    fn default() -> Self {
        MovementFilter {
            kind: None,
            since: None,
            until: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Returns a product's movements, newest first.
pub async fn movements(
    pool: &SqlitePool,
    product_id: &str,
    filter: &MovementFilter,
) -> LedgerResult<Vec<InventoryMovement>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, product_id, user_id, kind, quantity,
                stock_before, stock_after, unit_cost_cents, reason,
                reference_id, reference_kind, created_at
         FROM inventory_movements WHERE product_id = ",
    );
    qb.push_bind(product_id);

    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind);
    }
    if let Some(since) = filter.since {
        qb.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        qb.push(" AND created_at <= ").push_bind(until);
    }

    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let rows = qb
        .build_query_as::<InventoryMovement>()
        .fetch_all(pool)
        .await
        .map_err(DbError::from)?;

    Ok(rows)
}
