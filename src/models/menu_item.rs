//! Menu Item model
//!
//! A sellable item with a menu price and a cached cost derived from its
//! components. The cost column is a materialized view, recomputable at any
//! time from the component lines.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::costing;
use crate::db::DbResult;

/// A menu item with cached cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    pub price: f64,
    pub cost: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new menu item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItemCreate {
    pub restaurant_id: i64,
    pub name: String,
    #[serde(default)]
    pub price: f64,
}

/// Data for updating a menu item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuItemUpdate {
    pub name: Option<String>,
    pub price: Option<f64>,
}

impl MenuItem {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            restaurant_id: row.get("restaurant_id")?,
            name: row.get("name")?,
            price: row.get("price")?,
            cost: row.get("cost")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Profit margin from the menu price and cached cost
    pub fn margin(&self) -> Option<f64> {
        costing::margin(self.price, self.cost)
    }

    /// Insert a new menu item into the database
    pub fn create(conn: &Connection, data: &MenuItemCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO menu_items (restaurant_id, name, price)
            VALUES (?1, ?2, ?3)
            "#,
            params![data.restaurant_id, data.name, data.price],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a menu item by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM menu_items WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List menu items for a restaurant
    pub fn list_for_restaurant(conn: &Connection, restaurant_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM menu_items WHERE restaurant_id = ?1 ORDER BY name")?;

        let items = stmt
            .query_map([restaurant_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Update a menu item
    pub fn update(conn: &Connection, id: i64, data: &MenuItemUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref name) = data.name {
            updates.push(format!("name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(name.clone()));
        }
        if let Some(price) = data.price {
            updates.push(format!("price = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(price));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE menu_items SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Update the cached cost
    pub fn update_cached_cost(conn: &Connection, id: i64, cost: f64) -> DbResult<()> {
        conn.execute(
            "UPDATE menu_items SET cost = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![cost, id],
        )?;
        Ok(())
    }

    /// Delete a menu item
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM menu_items WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
