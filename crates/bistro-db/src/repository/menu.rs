//! # Menu Repository
//!
//! Menu items and their modifier options. Orders read these inside their own
//! transactions through the `pub(crate)` fetch helpers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bistro_core::validation::{validate_name, validate_price_cents, validate_price_delta_cents};
use bistro_core::{MenuItem, ModifierOption};

const MENU_COLUMNS: &str = "id, name, description, category, price_cents, is_available, \
                            preparation_minutes, created_at, updated_at";

const OPTION_COLUMNS: &str = "id, menu_item_id, name, price_delta_cents, is_default";

/// Input for a new menu item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMenuItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub preparation_minutes: Option<i64>,
}

/// Input for a new modifier option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewModifierOption {
    pub name: String,
    #[serde(default)]
    pub price_delta_cents: i64,
    #[serde(default)]
    pub is_default: bool,
}

/// Repository for menu database operations.
#[derive(Debug, Clone)]
pub struct MenuRepository {
    pool: SqlitePool,
}

impl MenuRepository {
    /// Creates a new MenuRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MenuRepository { pool }
    }

    /// Adds an item to the menu. New items are available.
    pub async fn create(&self, input: &NewMenuItem) -> DbResult<MenuItem> {
        validate_name(&input.name).map_err(bistro_core::CoreError::from)?;
        validate_price_cents(input.price_cents).map_err(bistro_core::CoreError::from)?;

        let now = Utc::now();
        let item = MenuItem {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            category: input.category.clone(),
            price_cents: input.price_cents,
            is_available: true,
            preparation_minutes: input.preparation_minutes,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %item.id, name = %item.name, "Creating menu item");

        sqlx::query(
            r#"
            INSERT INTO menu_items (
                id, name, description, category, price_cents,
                is_available, preparation_minutes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category)
        .bind(item.price_cents)
        .bind(item.is_available)
        .bind(item.preparation_minutes)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    /// Gets a menu item by ID.
    pub async fn get(&self, id: &str) -> DbResult<MenuItem> {
        let mut conn = self.pool.acquire().await?;
        fetch_menu_item(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("MenuItem", id))
    }

    /// Lists the menu ordered by category then name.
    pub async fn list(&self, available_only: bool) -> DbResult<Vec<MenuItem>> {
        let sql = format!(
            "SELECT {MENU_COLUMNS} FROM menu_items \
             WHERE (?1 = 0 OR is_available = 1) \
             ORDER BY category, name"
        );
        let items = sqlx::query_as::<_, MenuItem>(&sql)
            .bind(available_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Switches an item on or off (sold out).
    pub async fn set_availability(&self, id: &str, available: bool) -> DbResult<MenuItem> {
        let result = sqlx::query(
            "UPDATE menu_items SET is_available = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(available)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("MenuItem", id));
        }

        debug!(id = %id, available, "Menu item availability changed");
        self.get(id).await
    }

    /// Adds a modifier option to a menu item.
    pub async fn add_modifier(
        &self,
        menu_item_id: &str,
        input: &NewModifierOption,
    ) -> DbResult<ModifierOption> {
        validate_name(&input.name).map_err(bistro_core::CoreError::from)?;
        // Surface a missing item as NotFound instead of a foreign key error.
        let item = self.get(menu_item_id).await?;
        validate_price_delta_cents(input.price_delta_cents, item.price_cents)
            .map_err(bistro_core::CoreError::from)?;

        let option = ModifierOption {
            id: Uuid::new_v4().to_string(),
            menu_item_id: menu_item_id.to_string(),
            name: input.name.trim().to_string(),
            price_delta_cents: input.price_delta_cents,
            is_default: input.is_default,
        };

        sqlx::query(
            r#"
            INSERT INTO modifier_options (id, menu_item_id, name, price_delta_cents, is_default)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&option.id)
        .bind(&option.menu_item_id)
        .bind(&option.name)
        .bind(option.price_delta_cents)
        .bind(option.is_default)
        .execute(&self.pool)
        .await?;

        Ok(option)
    }

    /// Modifier options of a menu item.
    pub async fn modifiers(&self, menu_item_id: &str) -> DbResult<Vec<ModifierOption>> {
        self.get(menu_item_id).await?;
        let mut conn = self.pool.acquire().await?;
        fetch_options(&mut *conn, menu_item_id).await
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

pub(crate) async fn fetch_menu_item(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<MenuItem>> {
    let sql = format!("SELECT {MENU_COLUMNS} FROM menu_items WHERE id = ?1");
    let item = sqlx::query_as::<_, MenuItem>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(item)
}

pub(crate) async fn fetch_options(
    conn: &mut SqliteConnection,
    menu_item_id: &str,
) -> DbResult<Vec<ModifierOption>> {
    let sql = format!(
        "SELECT {OPTION_COLUMNS} FROM modifier_options WHERE menu_item_id = ?1 ORDER BY name"
    );
    let options = sqlx::query_as::<_, ModifierOption>(&sql)
        .bind(menu_item_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(options)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bistro_core::CoreError;

    fn new_item(name: &str, price_cents: i64) -> NewMenuItem {
        NewMenuItem {
            name: name.to_string(),
            description: None,
            category: Some("mains".to_string()),
            price_cents,
            preparation_minutes: Some(12),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let menu = db.menu();

        let burger = menu.create(&new_item("Burger", 1000)).await.unwrap();
        menu.create(&new_item("Salad", 750)).await.unwrap();

        assert_eq!(menu.list(false).await.unwrap().len(), 2);

        menu.set_availability(&burger.id, false).await.unwrap();
        let available = menu.list(true).await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name, "Salad");
        assert!(!menu.get(&burger.id).await.unwrap().is_available);
    }

    #[tokio::test]
    async fn test_modifiers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let menu = db.menu();
        let pizza = menu.create(&new_item("Pizza", 1200)).await.unwrap();

        let cheese = NewModifierOption {
            name: "Extra cheese".to_string(),
            price_delta_cents: 150,
            is_default: false,
        };
        menu.add_modifier(&pizza.id, &cheese).await.unwrap();

        let options = menu.modifiers(&pizza.id).await.unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].price_delta_cents, 150);

        assert!(matches!(
            menu.add_modifier("missing", &cheese).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(matches!(
            db.menu().create(&new_item("", 100)).await,
            Err(DbError::Domain(_))
        ));
        assert!(matches!(
            db.menu().create(&new_item("Soup", -1)).await,
            Err(DbError::Domain(_))
        ));
        assert!(matches!(
            db.menu().create(&new_item("Caviar", i64::MAX / 2)).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_modifier_cannot_price_item_below_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let menu = db.menu();
        let tea = menu.create(&new_item("Tea", 100)).await.unwrap();

        let too_cheap = NewModifierOption {
            name: "Staff discount".to_string(),
            price_delta_cents: -500,
            is_default: false,
        };
        assert!(matches!(
            menu.add_modifier(&tea.id, &too_cheap).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));

        let free = NewModifierOption {
            price_delta_cents: -100,
            ..too_cheap
        };
        menu.add_modifier(&tea.id, &free).await.unwrap();
        assert_eq!(menu.modifiers(&tea.id).await.unwrap().len(), 1);
    }
}
