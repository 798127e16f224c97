//! # Table Rules
//!
//! Occupancy checks for the Table Registry. The store applies them inside a
//! transaction and backs them with conditional updates; this module only
//! decides.
//!
//! Invariant: `current_order_id.is_some() ⇔ status == Occupied`.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Table, TableStatus};

impl Table {
    /// True when the occupancy invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.current_order_id.is_some() == (self.status == TableStatus::Occupied)
    }

    /// Can `order_id` be seated here?
    ///
    /// Re-assigning the order the table already holds is allowed.
    pub fn check_assignable(&self, order_id: &str) -> CoreResult<()> {
        match self.current_order_id.as_deref() {
            Some(current) if current == order_id => Ok(()),
            Some(current) => Err(CoreError::TableOccupied {
                table_id: self.id.clone(),
                order_id: current.to_string(),
            }),
            None => match self.status {
                TableStatus::Dirty | TableStatus::Maintenance => {
                    Err(CoreError::TableUnavailable {
                        table_id: self.id.clone(),
                        status: self.status.to_string(),
                    })
                }
                _ => Ok(()),
            },
        }
    }

    pub fn assign(&mut self, order_id: &str, now: DateTime<Utc>) -> CoreResult<()> {
        self.check_assignable(order_id)?;
        self.current_order_id = Some(order_id.to_string());
        self.status = TableStatus::Occupied;
        self.updated_at = now;
        Ok(())
    }

    /// Frees the table. Returns the order it held, `None` if it was already free.
    pub fn release(&mut self, now: DateTime<Utc>) -> Option<String> {
        let previous = self.current_order_id.take();
        if previous.is_some() {
            self.status = TableStatus::Available;
            self.updated_at = now;
        }
        previous
    }

    /// Manual status change from the floor plan.
    ///
    /// `occupied` is reachable only through assignment, and a table holding an
    /// order keeps it until released.
    pub fn check_manual_status(&self, next: TableStatus) -> CoreResult<()> {
        if next == TableStatus::Occupied {
            return Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: ["available", "reserved", "dirty", "maintenance"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }
            .into());
        }
        if let Some(order_id) = &self.current_order_id {
            return Err(CoreError::TableOccupied {
                table_id: self.id.clone(),
                order_id: order_id.clone(),
            });
        }
        Ok(())
    }
}

/// Checks a transfer of `order_id` from `from` to `to`.
///
/// ## Errors
/// - `Validation` when both tables are the same
/// - `Conflict` when `from` no longer holds the order (lost a race)
/// - `TargetOccupied` / `TableUnavailable` for the destination
pub fn check_transfer(from: &Table, to: &Table, order_id: &str) -> CoreResult<()> {
    if from.id == to.id {
        return Err(ValidationError::InvalidFormat {
            field: "to_table_id".to_string(),
            reason: "must differ from the current table".to_string(),
        }
        .into());
    }
    if from.current_order_id.as_deref() != Some(order_id) {
        return Err(CoreError::Conflict(format!(
            "table {} does not hold order {}",
            from.id, order_id
        )));
    }
    to.check_assignable(order_id).map_err(|err| match err {
        CoreError::TableOccupied { table_id, order_id } => {
            CoreError::TargetOccupied { table_id, order_id }
        }
        other => other,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: &str) -> Table {
        Table {
            id: id.to_string(),
            number: 1,
            name: None,
            section: None,
            capacity: 4,
            status: TableStatus::Available,
            current_order_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_assign_then_second_order_is_rejected() {
        let mut t = table("t1");
        t.assign("o1", Utc::now()).unwrap();
        assert!(t.is_consistent());

        let err = t.assign("o2", Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::TableOccupied { ref order_id, .. } if order_id == "o1"));
        assert_eq!(t.current_order_id.as_deref(), Some("o1"));

        // Same order again is fine.
        t.assign("o1", Utc::now()).unwrap();
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut t = table("t1");
        t.assign("o1", Utc::now()).unwrap();
        assert_eq!(t.release(Utc::now()).as_deref(), Some("o1"));
        assert_eq!(t.status, TableStatus::Available);
        assert_eq!(t.release(Utc::now()), None);
        assert!(t.is_consistent());
    }

    #[test]
    fn test_unavailable_tables() {
        let mut t = table("t1");
        t.status = TableStatus::Maintenance;
        assert!(matches!(
            t.check_assignable("o1"),
            Err(CoreError::TableUnavailable { .. })
        ));

        t.status = TableStatus::Reserved;
        assert!(t.check_assignable("o1").is_ok());
    }

    #[test]
    fn test_manual_status() {
        let mut t = table("t1");
        assert!(t.check_manual_status(TableStatus::Dirty).is_ok());
        assert!(t.check_manual_status(TableStatus::Occupied).is_err());

        t.assign("o1", Utc::now()).unwrap();
        assert!(matches!(
            t.check_manual_status(TableStatus::Available),
            Err(CoreError::TableOccupied { .. })
        ));
    }

    #[test]
    fn test_check_transfer() {
        let mut from = table("t1");
        let mut to = table("t2");
        from.assign("o1", Utc::now()).unwrap();
        assert!(check_transfer(&from, &to, "o1").is_ok());

        to.assign("o2", Utc::now()).unwrap();
        assert!(matches!(
            check_transfer(&from, &to, "o1"),
            Err(CoreError::TargetOccupied { .. })
        ));

        assert!(matches!(
            check_transfer(&to, &from, "o1"),
            Err(CoreError::Conflict(_))
        ));
        assert!(matches!(
            check_transfer(&from, &from, "o1"),
            Err(CoreError::Validation(_))
        ));
    }
}
