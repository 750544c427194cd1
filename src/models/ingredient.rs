//! Ingredient model
//!
//! Canonical ingredient catalog. After standardization an ingredient's unit is
//! always a standard unit ("oz", "fl oz", "each") and `last_price` is the
//! price for one unit of it.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::costing::StandardizedLine;
use crate::db::DbResult;

/// An ingredient with its standardized unit and last known price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    pub unit: String,
    pub last_price: f64,
    pub last_ordered_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new ingredient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientCreate {
    pub restaurant_id: i64,
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub last_price: f64,
}

/// Data for updating an ingredient
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngredientUpdate {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub last_price: Option<f64>,
    pub last_ordered_at: Option<String>,
}

impl Ingredient {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            restaurant_id: row.get("restaurant_id")?,
            name: row.get("name")?,
            unit: row.get("unit")?,
            last_price: row.get("last_price")?,
            last_ordered_at: row.get("last_ordered_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a new ingredient into the database
    pub fn create(conn: &Connection, data: &IngredientCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO ingredients (restaurant_id, name, unit, last_price)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![data.restaurant_id, data.name, data.unit, data.last_price],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get an ingredient by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM ingredients WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(ingredient) => Ok(Some(ingredient)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get an ingredient by name within a restaurant
    pub fn get_by_name(conn: &Connection, restaurant_id: i64, name: &str) -> DbResult<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM ingredients WHERE restaurant_id = ?1 AND name = ?2")?;

        let result = stmt.query_row(params![restaurant_id, name], Self::from_row);
        match result {
            Ok(ingredient) => Ok(Some(ingredient)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List ingredients for a restaurant
    pub fn list_for_restaurant(conn: &Connection, restaurant_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM ingredients WHERE restaurant_id = ?1 ORDER BY name")?;

        let ingredients = stmt
            .query_map([restaurant_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ingredients)
    }

    /// Update an ingredient
    pub fn update(conn: &Connection, id: i64, data: &IngredientUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref name) = data.name {
            updates.push(format!("name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(name.clone()));
        }
        if let Some(ref unit) = data.unit {
            updates.push(format!("unit = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(unit.clone()));
        }
        if let Some(price) = data.last_price {
            updates.push(format!("last_price = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(price));
        }
        if let Some(ref ordered_at) = data.last_ordered_at {
            updates.push(format!("last_ordered_at = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(ordered_at.clone()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE ingredients SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Apply a standardized invoice line: insert the ingredient or update its
    /// unit, per-standard-unit price and last-ordered timestamp
    pub fn upsert_standardized(
        conn: &Connection,
        restaurant_id: i64,
        line: &StandardizedLine,
        ordered_at: &str,
    ) -> DbResult<Self> {
        match Self::get_by_name(conn, restaurant_id, &line.name)? {
            Some(existing) => {
                conn.execute(
                    r#"
                    UPDATE ingredients
                    SET unit = ?1, last_price = ?2, last_ordered_at = ?3,
                        updated_at = datetime('now')
                    WHERE id = ?4
                    "#,
                    params![
                        line.standard_unit,
                        line.standard_unit_cost,
                        ordered_at,
                        existing.id
                    ],
                )?;
                Self::get_by_id(conn, existing.id)?.ok_or_else(|| {
                    crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
                })
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO ingredients (restaurant_id, name, unit, last_price, last_ordered_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        restaurant_id,
                        line.name,
                        line.standard_unit,
                        line.standard_unit_cost,
                        ordered_at
                    ],
                )?;
                let id = conn.last_insert_rowid();
                Self::get_by_id(conn, id)?.ok_or_else(|| {
                    crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
                })
            }
        }
    }

    /// Delete an ingredient
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM ingredients WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
