//! Sale, sale-item and return rows.
//!
//! Sale and SaleItem rows are inserted once, inside the sale's unit of
//! work, and thereafter mutated only by void (status + void fields) and by
//! return processing (`returned_qty`, status). Nothing here is ever
//! deleted; compensations are new rows.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use crate::error::{DbError, DbResult};
use caja_core::{Return, ReturnItem, Sale, SaleItem, SaleStatus};

// =============================================================================
// Sales
// =============================================================================

pub async fn insert_sale<'e, E>(executor: E, sale: &Sale) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO sales (
            id, receipt_number, user_id, status,
            subtotal_cents, discount_cents, discount_bps, tax_cents, total_cents,
            payment_method, amount_paid_cents, change_cents,
            notes, void_reason, voided_at, voided_by_id,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
    )
    .bind(&sale.id)
    .bind(sale.receipt_number)
    .bind(&sale.user_id)
    .bind(sale.status)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.discount_bps)
    .bind(sale.tax_cents)
    .bind(sale.total_cents)
    .bind(sale.payment_method)
    .bind(sale.amount_paid_cents)
    .bind(sale.change_cents)
    .bind(&sale.notes)
    .bind(&sale.void_reason)
    .bind(sale.voided_at)
    .bind(&sale.voided_by_id)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn fetch_sale<'e, E>(executor: E, id: &str) -> DbResult<Option<Sale>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sale = sqlx::query_as::<_, Sale>(
        "SELECT id, receipt_number, user_id, status,
                subtotal_cents, discount_cents, discount_bps, tax_cents, total_cents,
                payment_method, amount_paid_cents, change_cents,
                notes, void_reason, voided_at, voided_by_id,
                created_at, updated_at
         FROM sales WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(sale)
}

/// Marks a sale voided. Guarded on status so a concurrent void loses.
pub async fn mark_voided<'e, E>(
    executor: E,
    sale_id: &str,
    reason: &str,
    voided_by: &str,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE sales SET
            status = 'VOIDED', void_reason = ?2, voided_at = ?3, voided_by_id = ?4,
            updated_at = ?3
         WHERE id = ?1 AND status != 'VOIDED'",
    )
    .bind(sale_id)
    .bind(reason)
    .bind(now)
    .bind(voided_by)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sale (not voided)", sale_id));
    }

    Ok(())
}

pub async fn set_status<'e, E>(
    executor: E,
    sale_id: &str,
    status: SaleStatus,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE sales SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(sale_id)
        .bind(status)
        .bind(now)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sale", sale_id));
    }

    Ok(())
}

// =============================================================================
// Sale Items
// =============================================================================

pub async fn insert_item<'e, E>(executor: E, item: &SaleItem) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO sale_items (
            id, sale_id, product_id, product_sku, product_name,
            unit_price_cents, cost_price_cents, tax_rate_bps,
            quantity, discount_bps, discount_cents,
            subtotal_cents, tax_cents, total_cents,
            returned_qty, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.product_sku)
    .bind(&item.product_name)
    .bind(item.unit_price_cents)
    .bind(item.cost_price_cents)
    .bind(item.tax_rate_bps)
    .bind(item.quantity)
    .bind(item.discount_bps)
    .bind(item.discount_cents)
    .bind(item.subtotal_cents)
    .bind(item.tax_cents)
    .bind(item.total_cents)
    .bind(item.returned_qty)
    .bind(item.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// All items of a sale, in insertion order.
pub async fn fetch_items<'e, E>(executor: E, sale_id: &str) -> DbResult<Vec<SaleItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let items = sqlx::query_as::<_, SaleItem>(
        "SELECT id, sale_id, product_id, product_sku, product_name,
                unit_price_cents, cost_price_cents, tax_rate_bps,
                quantity, discount_bps, discount_cents,
                subtotal_cents, tax_cents, total_cents,
                returned_qty, created_at
         FROM sale_items WHERE sale_id = ?1
         ORDER BY created_at, id",
    )
    .bind(sale_id)
    .fetch_all(executor)
    .await?;

    Ok(items)
}

/// Adds to an item's returned quantity. The schema CHECK rejects any
/// update that would exceed the sold quantity.
pub async fn add_returned_qty<'e, E>(executor: E, item_id: &str, quantity: i64) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result =
        sqlx::query("UPDATE sale_items SET returned_qty = returned_qty + ?2 WHERE id = ?1")
            .bind(item_id)
            .bind(quantity)
            .execute(executor)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sale item", item_id));
    }

    Ok(())
}

// =============================================================================
// Returns
// =============================================================================

pub async fn insert_return<'e, E>(executor: E, ret: &Return) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO returns (
            id, return_number, sale_id, user_id, reason, total_refund_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&ret.id)
    .bind(ret.return_number)
    .bind(&ret.sale_id)
    .bind(&ret.user_id)
    .bind(&ret.reason)
    .bind(ret.total_refund_cents)
    .bind(ret.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn insert_return_item<'e, E>(executor: E, item: &ReturnItem) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO return_items (
            id, return_id, sale_item_id, product_id, quantity,
            unit_price_cents, refund_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(&item.id)
    .bind(&item.return_id)
    .bind(&item.sale_item_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.refund_cents)
    .bind(item.created_at)
    .execute(executor)
    .await?;

    Ok(())
}
