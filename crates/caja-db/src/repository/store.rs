//! Store configuration. A single row seeded by the migrations; the ledger
//! only cares about the negative-stock policy.

use sqlx::{Executor, Sqlite};

use crate::error::{DbError, DbResult};
use caja_core::StorePolicy;

pub async fn policy<'e, E>(executor: E) -> DbResult<StorePolicy>
where
    E: Executor<'e, Database = Sqlite>,
{
    let policy = sqlx::query_as::<_, StorePolicy>(
        "SELECT allow_negative_stock FROM store_config LIMIT 1",
    )
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DbError::not_found("Store config", "singleton"))?;

    Ok(policy)
}

pub async fn set_allow_negative_stock<'e, E>(executor: E, allow: bool) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE store_config SET allow_negative_stock = ?1, updated_at = updated_at")
        .bind(allow)
        .execute(executor)
        .await?;

    Ok(())
}
