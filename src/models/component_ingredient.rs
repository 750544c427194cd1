//! Component Ingredient model
//!
//! Recipe lines linking ingredients to components, plus the cascading cost
//! recompute that runs when an ingredient's price changes.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::costing::{
    self, ConversionFailurePolicy, MenuItemSnapshot, RecipeLine, UnitNormalizer,
};
use crate::db::{DbError, DbResult};

use super::{Component, CostChange, CostChangeCreate, MenuItem};

/// A recipe line: a quantity of an ingredient used by a component.
///
/// The unit may differ from the ingredient's standard unit; conversion
/// happens at cost-computation time, not at storage time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentIngredient {
    pub id: i64,
    pub component_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Recipe line with ingredient details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentIngredientDetail {
    pub id: i64,
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: String,
    pub ingredient_unit: String,
    pub ingredient_price: f64,
}

/// Data for adding an ingredient line to a component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentIngredientCreate {
    pub component_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: String,
}

/// Data for updating a recipe line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentIngredientUpdate {
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

impl ComponentIngredient {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            component_id: row.get("component_id")?,
            ingredient_id: row.get("ingredient_id")?,
            quantity: row.get("quantity")?,
            unit: row.get("unit")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Add an ingredient line to a component
    pub fn create(conn: &Connection, data: &ComponentIngredientCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO component_ingredients (component_id, ingredient_id, quantity, unit)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                data.component_id,
                data.ingredient_id,
                data.quantity,
                data.unit,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a recipe line by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM component_ingredients WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(line) => Ok(Some(line)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all recipe lines for a component
    pub fn get_for_component(conn: &Connection, component_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM component_ingredients WHERE component_id = ?1 ORDER BY id")?;

        let lines = stmt
            .query_map([component_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(lines)
    }

    /// Get recipe lines with ingredient details for a component
    pub fn get_details_for_component(
        conn: &Connection,
        component_id: i64,
    ) -> DbResult<Vec<ComponentIngredientDetail>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT ci.id, ci.ingredient_id, i.name as ingredient_name,
                   ci.quantity, ci.unit, i.unit as ingredient_unit,
                   i.last_price as ingredient_price
            FROM component_ingredients ci
            INNER JOIN ingredients i ON ci.ingredient_id = i.id
            WHERE ci.component_id = ?1
            ORDER BY ci.id
            "#,
        )?;

        let details = stmt
            .query_map([component_id], |row| {
                Ok(ComponentIngredientDetail {
                    id: row.get("id")?,
                    ingredient_id: row.get("ingredient_id")?,
                    ingredient_name: row.get("ingredient_name")?,
                    quantity: row.get("quantity")?,
                    unit: row.get("unit")?,
                    ingredient_unit: row.get("ingredient_unit")?,
                    ingredient_price: row.get("ingredient_price")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(details)
    }

    /// Update a recipe line
    pub fn update(
        conn: &Connection,
        id: i64,
        data: &ComponentIngredientUpdate,
    ) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(quantity) = data.quantity {
            updates.push(format!("quantity = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(quantity));
        }
        if let Some(ref unit) = data.unit {
            updates.push(format!("unit = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(unit.clone()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE component_ingredients SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete a recipe line
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM component_ingredients WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

/// Load a component's lines joined with ingredient names and prices.
///
/// A dangling ingredient reference is an error here (not silently dropped)
/// so the cascade can isolate the affected menu item.
fn load_recipe_lines(conn: &Connection, component_id: i64) -> DbResult<Vec<RecipeLine>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT ci.id, ci.quantity, ci.unit, i.name as ingredient_name,
               i.last_price as ingredient_price
        FROM component_ingredients ci
        LEFT JOIN ingredients i ON ci.ingredient_id = i.id
        WHERE ci.component_id = ?1
        ORDER BY ci.id
        "#,
    )?;

    let rows = stmt
        .query_map([component_id], |row| {
            Ok((
                row.get::<_, i64>("id")?,
                row.get::<_, f64>("quantity")?,
                row.get::<_, String>("unit")?,
                row.get::<_, Option<String>>("ingredient_name")?,
                row.get::<_, Option<f64>>("ingredient_price")?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut lines = Vec::with_capacity(rows.len());
    for (line_id, quantity, unit, name, price) in rows {
        let ingredient_name = name.ok_or_else(|| {
            DbError::MissingRow(format!(
                "ingredient for recipe line {} of component {}",
                line_id, component_id
            ))
        })?;
        lines.push(RecipeLine {
            ingredient_name,
            quantity,
            unit,
            unit_price: price.unwrap_or(0.0),
        });
    }

    Ok(lines)
}

/// Compute a component's cost from its lines without touching the cache
pub fn compute_component_cost(
    conn: &Connection,
    normalizer: &UnitNormalizer,
    component_id: i64,
) -> DbResult<f64> {
    let lines = load_recipe_lines(conn, component_id)?;
    let unpriced = costing::unpriced_ingredients(&lines);
    if !unpriced.is_empty() {
        tracing::warn!(
            component_id,
            ingredients = ?unpriced,
            "component has unpriced ingredients; costing is incomplete"
        );
    }
    Ok(costing::component_cost(
        normalizer,
        &lines,
        ConversionFailurePolicy::default(),
    ))
}

/// Recompute a component's cost and update the cache
pub fn recompute_component_cost(
    conn: &Connection,
    normalizer: &UnitNormalizer,
    component_id: i64,
) -> DbResult<f64> {
    let cost = compute_component_cost(conn, normalizer, component_id)?;
    Component::update_cached_cost(conn, component_id, cost)?;
    Ok(cost)
}

/// Compute a menu item's cost by recomputing each of its components
pub fn compute_menu_item_cost(
    conn: &Connection,
    normalizer: &UnitNormalizer,
    menu_item_id: i64,
) -> DbResult<f64> {
    let components = Component::get_for_menu_item(conn, menu_item_id)?;
    let mut component_costs = Vec::with_capacity(components.len());
    for component in &components {
        component_costs.push(compute_component_cost(conn, normalizer, component.id)?);
    }
    Ok(costing::menu_item_cost(&component_costs))
}

/// Recompute a menu item's components and its own cost, updating all caches
pub fn recompute_menu_item_cost(
    conn: &Connection,
    normalizer: &UnitNormalizer,
    menu_item_id: i64,
) -> DbResult<f64> {
    let components = Component::get_for_menu_item(conn, menu_item_id)?;
    let mut component_costs = Vec::with_capacity(components.len());
    for component in &components {
        component_costs.push(recompute_component_cost(conn, normalizer, component.id)?);
    }
    let cost = costing::menu_item_cost(&component_costs);
    MenuItem::update_cached_cost(conn, menu_item_id, cost)?;
    Ok(cost)
}

/// A menu item skipped during a cascade because its data was unusable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedMenuItem {
    pub menu_item_id: i64,
    pub message: String,
}

/// Result of a cascading cost recompute
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub menu_items_recomputed: i64,
    pub changes_recorded: i64,
    pub skipped: Vec<SkippedMenuItem>,
}

/// Snapshot the menu items referencing an ingredient, with their currently
/// stored costs. Must run before the ingredient's price is mutated so the
/// before/after deltas are correct.
pub fn snapshot_affected_menu_items(
    conn: &Connection,
    ingredient_id: i64,
) -> DbResult<Vec<MenuItemSnapshot>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT mi.id, mi.cost
        FROM component_ingredients ci
        INNER JOIN components c ON ci.component_id = c.id
        INNER JOIN menu_items mi ON c.menu_item_id = mi.id
        WHERE ci.ingredient_id = ?1
        "#,
    )?;

    let refs = stmt
        .query_map([ingredient_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(costing::affected_menu_items(refs))
}

/// Cascading recompute: when an ingredient's price changes, recompute every
/// menu item that references it and record cost history for real changes.
///
/// Strictly sequential per ingredient: snapshot, recompute components, then
/// menu items, then the changed/unchanged verdict. A failure in one menu
/// item's recompute is isolated; the rest of the batch continues.
pub fn cascade_recompute_from_ingredient(
    conn: &Connection,
    normalizer: &UnitNormalizer,
    ingredient_id: i64,
    reason: &str,
) -> DbResult<CascadeOutcome> {
    cascade_recompute_with_snapshots(
        conn,
        normalizer,
        &snapshot_affected_menu_items(conn, ingredient_id)?,
        reason,
    )
}

/// Run the recompute/diff/record phase against pre-taken snapshots.
///
/// Split out so the invoice flow can snapshot before it mutates the price.
pub fn cascade_recompute_with_snapshots(
    conn: &Connection,
    normalizer: &UnitNormalizer,
    snapshots: &[MenuItemSnapshot],
    reason: &str,
) -> DbResult<CascadeOutcome> {
    let mut outcome = CascadeOutcome::default();

    for snapshot in snapshots {
        let recomputed = recompute_menu_item_cost(conn, normalizer, snapshot.menu_item_id);
        let new_cost = match recomputed {
            Ok(cost) => cost,
            Err(e) => {
                tracing::warn!(
                    menu_item_id = snapshot.menu_item_id,
                    error = %e,
                    "menu item recompute failed; skipping"
                );
                outcome.skipped.push(SkippedMenuItem {
                    menu_item_id: snapshot.menu_item_id,
                    message: e.to_string(),
                });
                continue;
            }
        };

        outcome.menu_items_recomputed += 1;

        let verdict = costing::recompute_and_diff(snapshot.cost_before, &[new_cost]);
        if verdict.changed {
            CostChange::create(
                conn,
                &CostChangeCreate {
                    menu_item_id: snapshot.menu_item_id,
                    old_cost: snapshot.cost_before,
                    new_cost: verdict.new_cost,
                    delta: verdict.delta,
                    reason: reason.to_string(),
                },
            )?;
            outcome.changes_recorded += 1;
            tracing::info!(
                menu_item_id = snapshot.menu_item_id,
                old_cost = snapshot.cost_before,
                new_cost = verdict.new_cost,
                "menu item cost changed"
            );
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::{
        ComponentCreate, Ingredient, IngredientCreate, MenuItemCreate, Restaurant,
        RestaurantCreate,
    };

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn seed_restaurant(conn: &Connection) -> i64 {
        Restaurant::create(
            conn,
            &RestaurantCreate {
                name: "Test Kitchen".to_string(),
            },
        )
        .unwrap()
        .id
    }

    fn seed_ingredient(conn: &Connection, restaurant_id: i64, name: &str, price: f64) -> i64 {
        Ingredient::create(
            conn,
            &IngredientCreate {
                restaurant_id,
                name: name.to_string(),
                unit: "oz".to_string(),
                last_price: price,
            },
        )
        .unwrap()
        .id
    }

    fn seed_menu_item(conn: &Connection, restaurant_id: i64, name: &str, price: f64) -> i64 {
        MenuItem::create(
            conn,
            &MenuItemCreate {
                restaurant_id,
                name: name.to_string(),
                price,
            },
        )
        .unwrap()
        .id
    }

    fn seed_component(conn: &Connection, menu_item_id: i64, name: &str) -> i64 {
        Component::create(
            conn,
            &ComponentCreate {
                menu_item_id,
                name: name.to_string(),
            },
        )
        .unwrap()
        .id
    }

    fn seed_line(conn: &Connection, component_id: i64, ingredient_id: i64, qty: f64, unit: &str) {
        ComponentIngredient::create(
            conn,
            &ComponentIngredientCreate {
                component_id,
                ingredient_id,
                quantity: qty,
                unit: unit.to_string(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_component_cost_from_lines() {
        let conn = test_conn();
        let normalizer = UnitNormalizer::default();
        let restaurant = seed_restaurant(&conn);
        let flour = seed_ingredient(&conn, restaurant, "flour", 0.15625);
        let item = seed_menu_item(&conn, restaurant, "Burger", 8.0);
        let patty = seed_component(&conn, item, "patty");
        seed_line(&conn, patty, flour, 4.0, "oz");

        let cost = compute_component_cost(&conn, &normalizer, patty).unwrap();
        assert!((cost - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_recipe_unit_differs_from_standard_unit() {
        let conn = test_conn();
        let normalizer = UnitNormalizer::default();
        let restaurant = seed_restaurant(&conn);
        // Priced per oz, used by the lb
        let flour = seed_ingredient(&conn, restaurant, "flour", 0.15625);
        let item = seed_menu_item(&conn, restaurant, "Bread", 5.0);
        let dough = seed_component(&conn, item, "dough");
        seed_line(&conn, dough, flour, 1.0, "lb");

        let cost = compute_component_cost(&conn, &normalizer, dough).unwrap();
        assert!((cost - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_unpriced_ingredient_contributes_zero() {
        let conn = test_conn();
        let normalizer = UnitNormalizer::default();
        let restaurant = seed_restaurant(&conn);
        let flour = seed_ingredient(&conn, restaurant, "flour", 0.15625);
        let saffron = seed_ingredient(&conn, restaurant, "saffron", 0.0);
        let item = seed_menu_item(&conn, restaurant, "Rice", 12.0);
        let base = seed_component(&conn, item, "base");
        seed_line(&conn, base, flour, 4.0, "oz");
        seed_line(&conn, base, saffron, 1.0, "oz");

        let cost = compute_component_cost(&conn, &normalizer, base).unwrap();
        assert!((cost - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_cascade_records_change_and_updates_caches() {
        let conn = test_conn();
        let normalizer = UnitNormalizer::default();
        let restaurant = seed_restaurant(&conn);
        let beef = seed_ingredient(&conn, restaurant, "beef", 0.50);
        let item = seed_menu_item(&conn, restaurant, "Burger", 8.0);
        let patty = seed_component(&conn, item, "patty");
        seed_line(&conn, patty, beef, 6.0, "oz");

        // First cascade: cost goes 0 -> 3.00, history written
        let outcome =
            cascade_recompute_from_ingredient(&conn, &normalizer, beef, "invoice").unwrap();
        assert_eq!(outcome.menu_items_recomputed, 1);
        assert_eq!(outcome.changes_recorded, 1);
        assert!(outcome.skipped.is_empty());

        let item_row = MenuItem::get_by_id(&conn, item).unwrap().unwrap();
        assert!((item_row.cost - 3.0).abs() < 1e-9);
        let patty_row = Component::get_by_id(&conn, patty).unwrap().unwrap();
        assert!((patty_row.cost - 3.0).abs() < 1e-9);

        let changes = CostChange::list_for_menu_item(&conn, item).unwrap();
        assert_eq!(changes.len(), 1);
        assert!((changes[0].old_cost - 0.0).abs() < 1e-9);
        assert!((changes[0].new_cost - 3.0).abs() < 1e-9);
        assert_eq!(changes[0].reason, "invoice");

        // Second cascade with no price movement: no new history
        let outcome =
            cascade_recompute_from_ingredient(&conn, &normalizer, beef, "invoice").unwrap();
        assert_eq!(outcome.changes_recorded, 0);
        assert_eq!(CostChange::list_for_menu_item(&conn, item).unwrap().len(), 1);
    }

    #[test]
    fn test_cascade_sub_cent_change_is_not_recorded() {
        let conn = test_conn();
        let normalizer = UnitNormalizer::default();
        let restaurant = seed_restaurant(&conn);
        let salt = seed_ingredient(&conn, restaurant, "salt", 0.002);
        let item = seed_menu_item(&conn, restaurant, "Soup", 6.0);
        let broth = seed_component(&conn, item, "broth");
        seed_line(&conn, broth, salt, 1.0, "oz");

        // New cost 0.002, delta below the cent epsilon
        let outcome =
            cascade_recompute_from_ingredient(&conn, &normalizer, salt, "invoice").unwrap();
        assert_eq!(outcome.menu_items_recomputed, 1);
        assert_eq!(outcome.changes_recorded, 0);
    }

    #[test]
    fn test_cascade_dedupes_menu_items_across_components() {
        let conn = test_conn();
        let normalizer = UnitNormalizer::default();
        let restaurant = seed_restaurant(&conn);
        let garlic = seed_ingredient(&conn, restaurant, "garlic", 0.30);
        let item = seed_menu_item(&conn, restaurant, "Pasta", 11.0);
        let sauce = seed_component(&conn, item, "sauce");
        let topping = seed_component(&conn, item, "topping");
        seed_line(&conn, sauce, garlic, 2.0, "cloves");
        seed_line(&conn, topping, garlic, 1.0, "clove");

        let snapshots = snapshot_affected_menu_items(&conn, garlic).unwrap();
        assert_eq!(snapshots.len(), 1);

        let outcome =
            cascade_recompute_from_ingredient(&conn, &normalizer, garlic, "invoice").unwrap();
        assert_eq!(outcome.menu_items_recomputed, 1);

        // 2 cloves = 0.2 oz and 1 clove = 0.1 oz at $0.30/oz
        let item_row = MenuItem::get_by_id(&conn, item).unwrap().unwrap();
        assert!((item_row.cost - 0.09).abs() < 1e-9);
    }

    #[test]
    fn test_cascade_isolates_malformed_menu_item() {
        // Foreign keys are off for this bare in-memory connection, which lets
        // us fabricate the dangling ingredient reference the isolation
        // property is about. (The bundled SQLite is compiled with
        // SQLITE_DEFAULT_FOREIGN_KEYS=1, so turn enforcement off explicitly.)
        let conn = test_conn();
        conn.execute_batch("PRAGMA foreign_keys = OFF").unwrap();
        let normalizer = UnitNormalizer::default();
        let restaurant = seed_restaurant(&conn);
        let beef = seed_ingredient(&conn, restaurant, "beef", 0.50);
        let doomed = seed_ingredient(&conn, restaurant, "doomed", 0.25);

        let broken = seed_menu_item(&conn, restaurant, "Broken", 9.0);
        let broken_comp = seed_component(&conn, broken, "mix");
        seed_line(&conn, broken_comp, beef, 2.0, "oz");
        seed_line(&conn, broken_comp, doomed, 1.0, "oz");

        let healthy = seed_menu_item(&conn, restaurant, "Healthy", 7.0);
        let healthy_comp = seed_component(&conn, healthy, "patty");
        seed_line(&conn, healthy_comp, beef, 4.0, "oz");

        conn.execute("DELETE FROM ingredients WHERE id = ?1", [doomed])
            .unwrap();

        let outcome =
            cascade_recompute_from_ingredient(&conn, &normalizer, beef, "invoice").unwrap();
        assert_eq!(outcome.menu_items_recomputed, 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].menu_item_id, broken);

        // The sibling still got a correct cost
        let healthy_row = MenuItem::get_by_id(&conn, healthy).unwrap().unwrap();
        assert!((healthy_row.cost - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_menu_item_margin_after_recompute() {
        let conn = test_conn();
        let normalizer = UnitNormalizer::default();
        let restaurant = seed_restaurant(&conn);
        let a = seed_ingredient(&conn, restaurant, "a", 0.15625);
        let b = seed_ingredient(&conn, restaurant, "b", 1.20);
        let item = seed_menu_item(&conn, restaurant, "Salad", 8.0);
        let comp_a = seed_component(&conn, item, "dressing");
        let comp_b = seed_component(&conn, item, "greens");
        seed_line(&conn, comp_a, a, 4.0, "oz");
        seed_line(&conn, comp_b, b, 1.0, "oz");

        let cost = recompute_menu_item_cost(&conn, &normalizer, item).unwrap();
        assert!((cost - 1.825).abs() < 1e-9);

        let item_row = MenuItem::get_by_id(&conn, item).unwrap().unwrap();
        let margin = item_row.margin().unwrap();
        assert!((margin - 0.771875).abs() < 1e-9);
    }
}
