//! Cost Change model
//!
//! History rows recording menu-item cost movements, written only when a
//! recompute moves the cost by more than the cent epsilon.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// A recorded menu-item cost change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostChange {
    pub id: i64,
    pub menu_item_id: i64,
    pub old_cost: f64,
    pub new_cost: f64,
    pub delta: f64,
    pub reason: String,
    pub created_at: String,
}

/// Data for recording a cost change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostChangeCreate {
    pub menu_item_id: i64,
    pub old_cost: f64,
    pub new_cost: f64,
    pub delta: f64,
    pub reason: String,
}

impl CostChange {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            menu_item_id: row.get("menu_item_id")?,
            old_cost: row.get("old_cost")?,
            new_cost: row.get("new_cost")?,
            delta: row.get("delta")?,
            reason: row.get("reason")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Record a cost change
    pub fn create(conn: &Connection, data: &CostChangeCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO cost_changes (menu_item_id, old_cost, new_cost, delta, reason)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                data.menu_item_id,
                data.old_cost,
                data.new_cost,
                data.delta,
                data.reason,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let mut stmt = conn.prepare("SELECT * FROM cost_changes WHERE id = ?1")?;
        Ok(stmt.query_row([id], Self::from_row)?)
    }

    /// List cost changes for a menu item, most recent first
    pub fn list_for_menu_item(conn: &Connection, menu_item_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM cost_changes WHERE menu_item_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;

        let changes = stmt
            .query_map([menu_item_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(changes)
    }

    /// List recent cost changes across a restaurant
    pub fn list_for_restaurant(
        conn: &Connection,
        restaurant_id: i64,
        limit: i64,
    ) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT cc.*
            FROM cost_changes cc
            INNER JOIN menu_items mi ON cc.menu_item_id = mi.id
            WHERE mi.restaurant_id = ?1
            ORDER BY cc.created_at DESC, cc.id DESC
            LIMIT ?2
            "#,
        )?;

        let changes = stmt
            .query_map(params![restaurant_id, limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(changes)
    }
}
