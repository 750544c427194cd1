//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // Get current version
    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Run migrations
    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- RESTAURANTS
        -- Scope for ingredients, menu items and invoice saves
        -- ============================================
        CREATE TABLE restaurants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_restaurants_name ON restaurants(name);

        -- ============================================
        -- INGREDIENTS
        -- Canonical catalog; unit is always a standard unit after
        -- standardization and last_price is per one unit of it
        -- ============================================
        CREATE TABLE ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            restaurant_id INTEGER NOT NULL REFERENCES restaurants(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            unit TEXT NOT NULL,                  -- standard unit: "oz", "fl oz", "each"
            last_price REAL NOT NULL DEFAULT 0,  -- per one standard unit; 0 = unpriced
            last_ordered_at TEXT,                -- RFC 3339, set by invoice ingestion

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),

            UNIQUE(restaurant_id, name)
        );

        CREATE INDEX idx_ingredients_restaurant ON ingredients(restaurant_id);
        CREATE INDEX idx_ingredients_name ON ingredients(name);

        -- ============================================
        -- MENU ITEMS
        -- cost is a cache derived from component costs
        -- ============================================
        CREATE TABLE menu_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            restaurant_id INTEGER NOT NULL REFERENCES restaurants(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            price REAL NOT NULL DEFAULT 0,       -- menu price
            cost REAL NOT NULL DEFAULT 0,        -- cached, recomputable from components

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_menu_items_restaurant ON menu_items(restaurant_id);
        CREATE INDEX idx_menu_items_name ON menu_items(name);

        -- ============================================
        -- COMPONENTS
        -- Sub-assemblies of a menu item; cost is a cache
        -- ============================================
        CREATE TABLE components (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            menu_item_id INTEGER NOT NULL REFERENCES menu_items(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            cost REAL NOT NULL DEFAULT 0,        -- cached, recomputable from lines

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_components_menu_item ON components(menu_item_id);

        -- ============================================
        -- COMPONENT INGREDIENTS
        -- Recipe lines; unit may differ from the ingredient's standard
        -- unit and is converted at cost-computation time
        -- ============================================
        CREATE TABLE component_ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            component_id INTEGER NOT NULL REFERENCES components(id) ON DELETE CASCADE,
            ingredient_id INTEGER NOT NULL REFERENCES ingredients(id) ON DELETE RESTRICT,
            quantity REAL NOT NULL,
            unit TEXT NOT NULL,

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),

            UNIQUE(component_id, ingredient_id)
        );

        CREATE INDEX idx_component_ingredients_component ON component_ingredients(component_id);
        CREATE INDEX idx_component_ingredients_ingredient ON component_ingredients(ingredient_id);

        -- ============================================
        -- COST CHANGES
        -- History rows, written only when a recompute moves a menu
        -- item's cost by more than the epsilon
        -- ============================================
        CREATE TABLE cost_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            menu_item_id INTEGER NOT NULL REFERENCES menu_items(id) ON DELETE CASCADE,
            old_cost REAL NOT NULL,
            new_cost REAL NOT NULL,
            delta REAL NOT NULL,
            reason TEXT NOT NULL,

            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_cost_changes_menu_item ON cost_changes(menu_item_id);
        CREATE INDEX idx_cost_changes_created ON cost_changes(created_at);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}
