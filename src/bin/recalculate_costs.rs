//! Consistency-check/repair job for cached costs
//!
//! Component and menu-item costs are derived data; this utility re-derives
//! every cached cost from the underlying recipe lines, reports drift, and
//! records cost history for items whose cache was off by more than a cent.
//!
//! Usage: cargo run --bin recalculate_costs

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use platecost::costing::{recompute_and_diff, UnitNormalizer};
use platecost::models::{
    CostChange, CostChangeCreate, MenuItem, Restaurant, SkippedMenuItem,
};

/// Get the database path from environment or use default
fn get_database_path() -> PathBuf {
    std::env::var("PLATECOST_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(parent) = path.parent() {
                    if let Some(grandparent) = parent.parent() {
                        path = grandparent.to_path_buf();
                    }
                }
            }

            path.push("data");
            path.push("platecost.db");
            path
        })
}

#[derive(Debug, Default, serde::Serialize)]
struct RepairSummary {
    restaurants: i64,
    menu_items_checked: i64,
    menu_items_repaired: i64,
    skipped: Vec<SkippedMenuItem>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("platecost=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    platecost::build_info::print_startup_banner();

    let db_path = get_database_path();
    eprintln!("Database: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let database = platecost::db::Database::new(&db_path)?;
    database.with_conn(|conn| {
        platecost::db::migrations::run_migrations(conn)?;
        let version = platecost::db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    let normalizer = UnitNormalizer::default();
    let mut summary = RepairSummary::default();

    database.with_conn_mut(|conn| {
        let tx = conn.transaction()?;

        for restaurant in Restaurant::list(&tx)? {
            summary.restaurants += 1;

            for item in MenuItem::list_for_restaurant(&tx, restaurant.id)? {
                summary.menu_items_checked += 1;

                let recomputed = platecost::models::recompute_menu_item_cost(
                    &tx,
                    &normalizer,
                    item.id,
                );
                let new_cost = match recomputed {
                    Ok(cost) => cost,
                    Err(e) => {
                        tracing::warn!(
                            menu_item_id = item.id,
                            error = %e,
                            "repair skipped menu item"
                        );
                        summary.skipped.push(SkippedMenuItem {
                            menu_item_id: item.id,
                            message: e.to_string(),
                        });
                        continue;
                    }
                };

                let verdict = recompute_and_diff(item.cost, &[new_cost]);
                if verdict.changed {
                    summary.menu_items_repaired += 1;
                    tracing::info!(
                        menu_item_id = item.id,
                        old_cost = item.cost,
                        new_cost = verdict.new_cost,
                        "cached cost drifted; repaired"
                    );
                    CostChange::create(
                        &tx,
                        &CostChangeCreate {
                            menu_item_id: item.id,
                            old_cost: item.cost,
                            new_cost: verdict.new_cost,
                            delta: verdict.delta,
                            reason: "repair".to_string(),
                        },
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    })?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
