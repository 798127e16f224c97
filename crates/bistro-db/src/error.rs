//! # Database Error Types
//!
//! Error types for store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error                 CoreError (rule rejected inside a tx)      │
//! │       │                           │                                     │
//! │       ▼                           ▼                                     │
//! │  DbError (this module) ← classifies constraints, busy, not found        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (pos-api) ← status code + JSON body                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bistro_core::CoreError;
use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found.
    ///
    /// ## When This Occurs
    /// - Order, table, menu item or line id doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A business rule rejected the change. Nothing was written.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Lost a race with a concurrent writer, or the store was busy.
    ///
    /// ## When This Occurs
    /// - Two transfers of the same order; the second finds the table moved
    /// - `database is locked` after the busy timeout
    /// - Another order grabbed the table between check and update
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate table number
    /// - Duplicate order number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a non-existent menu item or table
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored data could not be decoded (e.g. modifier JSON).
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Conflict(_)
                | DbError::PoolExhausted
                | DbError::Domain(CoreError::Conflict(_))
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound        → DbError::NotFound
/// "database is locked" / busy     → DbError::Conflict
/// UNIQUE on current_order_id      → DbError::Conflict (occupancy race)
/// UNIQUE on anything else         → DbError::UniqueViolation
/// FOREIGN KEY                     → DbError::ForeignKeyViolation
/// sqlx::Error::PoolTimedOut       → DbError::PoolExhausted
/// Other                           → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if msg.contains("database is locked") || msg.contains("database is busy") {
                    DbError::Conflict(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    if field.contains("current_order_id") {
                        DbError::Conflict(format!("table assignment raced: {}", field))
                    } else {
                        DbError::UniqueViolation {
                            field,
                            value: "unknown".to_string(),
                        }
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Corrupt(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_pass_through() {
        let err: DbError = CoreError::ItemNotFound("x".into()).into();
        assert_eq!(err.to_string(), "Order item not found: x");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(DbError::Conflict("locked".into()).is_retryable());
        assert!(DbError::Domain(CoreError::Conflict("moved".into())).is_retryable());
        assert!(!DbError::not_found("Order", "o1").is_retryable());
    }
}
