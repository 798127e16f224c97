//! # Error Types
//!
//! Domain-specific error types for bistro-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bistro-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  bistro-db errors (separate crate)                                      │
//! │  └── DbError          - Store failures, wraps CoreError                 │
//! │                                                                         │
//! │  pos-api errors (in app)                                                │
//! │  └── ApiError         - What HTTP clients see (status + JSON)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant that reaches a client carries enough context (ids, statuses)
//! to be actionable without a log lookup.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// All of these are raised before any state changes, so a caller seeing one
/// knows the order/table is exactly as it was.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Quantity is below 1 or above the per-line maximum.
    #[error("Invalid quantity {requested}: must be between 1 and {max}")]
    InvalidQuantity { requested: i64, max: i64 },

    /// Menu item exists but is switched off.
    ///
    /// ## When This Occurs
    /// - Kitchen marked the dish as sold out
    /// - Manager disabled the item from the menu screen
    #[error("Menu item {0} is not available")]
    ItemUnavailable(String),

    /// The order has no line with this id.
    #[error("Order item not found: {0}")]
    ItemNotFound(String),

    /// The requested line cannot be built.
    ///
    /// ## When This Occurs
    /// - Menu item id does not exist
    /// - A modifier option does not belong to the menu item
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// Status change not allowed by the state machine.
    ///
    /// ## User Workflow
    /// ```text
    /// Order is completed
    ///      │
    ///      ▼
    /// PUT /orders/{id}/status {"status":"preparing"}
    ///      │
    ///      ▼
    /// InvalidTransition { from: "completed", to: "preparing" }
    ///      │
    ///      ▼
    /// 409, order untouched
    /// ```
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Table already holds a different active order.
    #[error("Table {table_id} is occupied by order {order_id}")]
    TableOccupied { table_id: String, order_id: String },

    /// Transfer destination already holds a different active order.
    #[error("Target table {table_id} is occupied by order {order_id}")]
    TargetOccupied { table_id: String, order_id: String },

    /// Table cannot take an order in its current status.
    #[error("Table {table_id} is {status} and cannot be assigned")]
    TableUnavailable { table_id: String, status: String },

    /// Mutation attempted on a completed or cancelled order.
    #[error("Order {order_id} is {status} and can no longer be changed")]
    OrderClosed { order_id: String, status: String },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Entity lookup failed.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Lost a race against another writer. Safe to retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns a short machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidQuantity { .. } => "invalid_quantity",
            CoreError::ItemUnavailable(_) => "item_unavailable",
            CoreError::ItemNotFound(_) => "item_not_found",
            CoreError::InvalidItem(_) => "invalid_item",
            CoreError::InvalidTransition { .. } => "invalid_transition",
            CoreError::TableOccupied { .. } => "table_occupied",
            CoreError::TargetOccupied { .. } => "target_occupied",
            CoreError::TableUnavailable { .. } => "table_unavailable",
            CoreError::OrderClosed { .. } => "order_closed",
            CoreError::InvalidPaymentAmount { .. } => "invalid_payment_amount",
            CoreError::NotFound { .. } => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Validation(_) => "validation_error",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by [`crate::validation`] before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, unknown enum value).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidTransition {
            from: "completed".to_string(),
            to: "preparing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition from completed to preparing"
        );

        let err = CoreError::not_found("Order", "abc");
        assert_eq!(err.to_string(), "Order not found: abc");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CoreError::TableOccupied {
                table_id: "t1".into(),
                order_id: "o1".into()
            }
            .code(),
            "table_occupied"
        );
        assert_eq!(CoreError::Conflict("race".into()).code(), "conflict");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.code(), "validation_error");
    }
}
