//! Component model
//!
//! A named sub-assembly of a menu item (e.g. "dressing", "patty") with its
//! own ingredient lines and a cached cost.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// A component of a menu item, with cached cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: i64,
    pub menu_item_id: i64,
    pub name: String,
    pub cost: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCreate {
    pub menu_item_id: i64,
    pub name: String,
}

/// Data for updating a component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentUpdate {
    pub name: Option<String>,
}

impl Component {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            menu_item_id: row.get("menu_item_id")?,
            name: row.get("name")?,
            cost: row.get("cost")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a new component into the database
    pub fn create(conn: &Connection, data: &ComponentCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO components (menu_item_id, name) VALUES (?1, ?2)",
            params![data.menu_item_id, data.name],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a component by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM components WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(component) => Ok(Some(component)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all components for a menu item
    pub fn get_for_menu_item(conn: &Connection, menu_item_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM components WHERE menu_item_id = ?1 ORDER BY id")?;

        let components = stmt
            .query_map([menu_item_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(components)
    }

    /// Update a component
    pub fn update(conn: &Connection, id: i64, data: &ComponentUpdate) -> DbResult<Option<Self>> {
        if let Some(ref name) = data.name {
            conn.execute(
                "UPDATE components SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name, id],
            )?;
        }
        Self::get_by_id(conn, id)
    }

    /// Update the cached cost
    pub fn update_cached_cost(conn: &Connection, id: i64, cost: f64) -> DbResult<()> {
        conn.execute(
            "UPDATE components SET cost = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![cost, id],
        )?;
        Ok(())
    }

    /// Delete a component
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM components WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
