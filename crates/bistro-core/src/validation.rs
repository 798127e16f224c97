//! # Validation Module
//!
//! Input validation for request payloads before they reach the order engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (serde)                                        │
//! │  └── Shape and type of the JSON body                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Names, prices, ids, rates, paging                                  │
//! │  └── Cheap checks, no store access                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Order aggregate / table rules                                 │
//! │  └── Quantity, availability, transitions, occupancy                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite constraints (UNIQUE, CHECK, FK)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Rate;
use crate::types::OrderType;
use crate::{MAX_ITEM_QUANTITY, MAX_PAGE_LIMIT, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (menu item, modifier, table name).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ```rust
/// use bistro_core::validation::validate_name;
///
/// assert!(validate_name("Margherita").is_ok());
/// assert!(validate_name("  ").is_err());
/// ```
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates free-text notes. Empty is fine.
pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    if notes.len() > 1000 {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: 1000,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (1..=999).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a menu price in cents. Zero is allowed (free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a modifier price delta against the price of its menu item.
///
/// A discounting modifier may bring the unit price down to zero, not below.
///
/// ```rust
/// use bistro_core::validation::validate_price_delta_cents;
///
/// assert!(validate_price_delta_cents(-300, 1000).is_ok());
/// assert!(validate_price_delta_cents(-1001, 1000).is_err());
/// ```
pub fn validate_price_delta_cents(delta: i64, item_price_cents: i64) -> ValidationResult<()> {
    let min = -item_price_cents.clamp(0, MAX_PRICE_CENTS);
    if !(min..=MAX_PRICE_CENTS).contains(&delta) {
        return Err(ValidationError::OutOfRange {
            field: "price_delta".to_string(),
            min,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents. Must be positive.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a discount in cents. Zero clears the discount.
pub fn validate_discount_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a tax or service rate (0% to 100%).
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if rate.bps() > Rate::MAX_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: Rate::MAX_BPS as i64,
        });
    }

    Ok(())
}

/// Validates table number and seating capacity.
pub fn validate_table_shape(number: i64, capacity: i64) -> ValidationResult<()> {
    if number <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "number".to_string(),
        });
    }

    if !(1..=100).contains(&capacity) {
        return Err(ValidationError::OutOfRange {
            field: "capacity".to_string(),
            min: 1,
            max: 100,
        });
    }

    Ok(())
}

/// Only dine-in orders sit at a table.
///
/// ```rust
/// use bistro_core::validation::validate_seating;
/// use bistro_core::OrderType;
///
/// assert!(validate_seating(OrderType::DineIn, Some("t1")).is_ok());
/// assert!(validate_seating(OrderType::Takeaway, None).is_ok());
/// assert!(validate_seating(OrderType::Delivery, Some("t1")).is_err());
/// ```
pub fn validate_seating(order_type: OrderType, table_id: Option<&str>) -> ValidationResult<()> {
    if table_id.is_some() && order_type != OrderType::DineIn {
        return Err(ValidationError::InvalidFormat {
            field: "table_id".to_string(),
            reason: "only dine_in orders take a table".to_string(),
        });
    }
    Ok(())
}

/// Normalises paging input.
///
/// ## Returns
/// `(limit, offset)` ready for SQL. Page is 1-based; missing values default to
/// page 1 with 50 rows.
pub fn validate_page(page: Option<i64>, limit: Option<i64>) -> ValidationResult<(i64, i64)> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(50);

    if page < 1 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_PAGE_LIMIT,
        });
    }

    let offset = (page - 1).checked_mul(limit).ok_or_else(|| ValidationError::OutOfRange {
        field: "page".to_string(),
        min: 1,
        max: i64::MAX / limit,
    })?;
    Ok((limit, offset))
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ```rust
/// use bistro_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Grilled Halloumi").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents(i64::MAX / 2).is_err());
        assert!(validate_payment_amount(1).is_ok());
        assert!(validate_payment_amount(0).is_err());
        assert!(validate_discount_cents(0).is_ok());
        assert!(validate_discount_cents(-5).is_err());
    }

    #[test]
    fn test_validate_price_delta() {
        assert!(validate_price_delta_cents(250, 1000).is_ok());
        assert!(validate_price_delta_cents(-1000, 1000).is_ok());
        assert!(validate_price_delta_cents(-1001, 1000).is_err());
        assert!(validate_price_delta_cents(-500, 100).is_err());
        assert!(validate_price_delta_cents(MAX_PRICE_CENTS + 1, 1000).is_err());
        assert!(validate_price_delta_cents(i64::MIN, 1000).is_err());
    }

    #[test]
    fn test_validate_rate() {
        assert!(validate_rate("tax_rate", Rate::from_bps(1400)).is_ok());
        assert!(validate_rate("tax_rate", Rate::from_bps(10_000)).is_ok());
        assert!(validate_rate("tax_rate", Rate::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_page() {
        assert_eq!(validate_page(None, None).unwrap(), (50, 0));
        assert_eq!(validate_page(Some(3), Some(20)).unwrap(), (20, 40));
        assert!(validate_page(Some(0), None).is_err());
        assert!(validate_page(None, Some(201)).is_err());
        assert!(validate_page(Some(i64::MAX), Some(200)).is_err());
    }

    #[test]
    fn test_validate_table_shape() {
        assert!(validate_table_shape(12, 4).is_ok());
        assert!(validate_table_shape(0, 4).is_err());
        assert!(validate_table_shape(1, 0).is_err());
    }

    #[test]
    fn test_validate_seating() {
        assert!(validate_seating(OrderType::DineIn, Some("t1")).is_ok());
        assert!(validate_seating(OrderType::DineIn, None).is_ok());
        assert!(validate_seating(OrderType::Online, None).is_ok());
        for order_type in [OrderType::Takeaway, OrderType::Delivery, OrderType::Online] {
            assert!(matches!(
                validate_seating(order_type, Some("t1")),
                Err(ValidationError::InvalidFormat { .. })
            ));
        }
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
