//! Product rows. The catalog itself is externally owned; the ledger reads
//! products for pricing/stock and `insert` exists for seeding and tests.
//! `current_stock` is written exclusively by [`crate::ledger`].

use sqlx::{Executor, Sqlite};

use crate::error::DbResult;
use caja_core::Product;

/// Fetches a product by id, active or not.
pub async fn fetch<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let product = sqlx::query_as::<_, Product>(
        "SELECT id, sku, name, sale_price_cents, cost_price_cents, tax_rate_bps,
                is_active, current_stock, min_stock, created_at, updated_at
         FROM products WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(product)
}

/// Inserts a product (reference-data seeding).
pub async fn insert<'e, E>(executor: E, product: &Product) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO products (
            id, sku, name, sale_price_cents, cost_price_cents, tax_rate_bps,
            is_active, current_stock, min_stock, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&product.id)
    .bind(&product.sku)
    .bind(&product.name)
    .bind(product.sale_price_cents)
    .bind(product.cost_price_cents)
    .bind(product.tax_rate_bps)
    .bind(product.is_active)
    .bind(product.current_stock)
    .bind(product.min_stock)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}
