//! # Database Error Types
//!
//! Storage-side errors and the umbrella error returned by engine operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error                                                    │
//! │       │  categorized by From<sqlx::Error>                       │
//! │       ▼                                                         │
//! │  DbError        Conflict / Unavailable / UniqueViolation / ...  │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  LedgerError    Business(CoreError) | Storage(DbError)          │
//! │       │         (what every engine operation returns)           │
//! │       ▼                                                         │
//! │  Caller renders a user-facing message                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Conflict` is the retryable case: SQLite reported a busy/locked write,
//! the unit of work was rolled back and can be re-run. `Unavailable` is
//! surfaced immediately; retrying could double-submit a sale.

use thiserror::Error;

use caja_core::CoreError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation (duplicate SKU, receipt number, ...).
    #[error("Duplicate value for {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// A concurrent writer held or invalidated our write lock. The unit of
    /// work rolled back cleanly and may be retried.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Storage cannot be reached (pool timeout, closed pool, I/O failure).
    /// Never retried automatically.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Database connection could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// SQLite reports contention as error codes 5 (SQLITE_BUSY) and
/// 6 (SQLITE_LOCKED); both map to `Conflict` so the engine can retry.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record",
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();

                if code == "5" || code == "6" || msg.contains("database is locked") {
                    DbError::Conflict(msg)
                } else if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation(field)
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation(msg)
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => {
                DbError::Unavailable("connection pool timed out".to_string())
            }
            sqlx::Error::PoolClosed => DbError::Unavailable("connection pool closed".to_string()),
            sqlx::Error::Io(e) => DbError::Unavailable(e.to_string()),

            other => DbError::QueryFailed(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Ledger Error (umbrella)
// =============================================================================

/// What every engine operation returns: either a business rule violation
/// (rolled back before commit, state unchanged) or a storage failure.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Business(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl LedgerError {
    /// Whether the failed unit of work may safely be re-run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Storage(DbError::Conflict(_)))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Storage(err.into())
    }
}

impl From<caja_core::ValidationError> for LedgerError {
    fn from(err: caja_core::ValidationError) -> Self {
        LedgerError::Business(err.into())
    }
}

/// Result type for engine and ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
