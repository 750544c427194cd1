//! Restaurant model
//!
//! The scope for ingredients, menu items and invoice saves.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// A restaurant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new restaurant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantCreate {
    pub name: String,
}

impl Restaurant {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a new restaurant into the database
    pub fn create(conn: &Connection, data: &RestaurantCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO restaurants (name) VALUES (?1)",
            params![data.name],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a restaurant by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM restaurants WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(restaurant) => Ok(Some(restaurant)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all restaurants
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM restaurants ORDER BY name")?;

        let restaurants = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(restaurants)
    }

    /// Rename a restaurant
    pub fn rename(conn: &Connection, id: i64, name: &str) -> DbResult<Option<Self>> {
        conn.execute(
            "UPDATE restaurants SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![name, id],
        )?;
        Self::get_by_id(conn, id)
    }

    /// Delete a restaurant
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM restaurants WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
