//! Invoice ingestion
//!
//! Applies a parsed invoice line to the ingredient catalog and recomputes the
//! dependent menu-item costs. The snapshot -> price write -> recompute ->
//! history sequence runs inside one transaction, and saves are serialized per
//! restaurant, so concurrent invoice saves cannot interleave their
//! read-modify-write of prices and cached costs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::costing::{StandardizedLine, UnitNormalizer};
use crate::db::{Database, DbError};
use crate::models::{
    cascade_recompute_with_snapshots, snapshot_affected_menu_items, CascadeOutcome, Ingredient,
    Restaurant,
};

/// Invoice ingestion error types
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(f64),

    #[error("Total cost must be non-negative, got {0}")]
    InvalidCost(f64),

    #[error("Restaurant {0} not found")]
    UnknownRestaurant(i64),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// A parsed invoice line as supplied by the upload flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub ingredient_name: String,
    pub total_cost: f64,
    pub quantity: f64,
    pub unit: String,
}

/// Result of saving one invoice line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSaveOutcome {
    pub ingredient: Ingredient,
    pub standardized: StandardizedLine,
    pub cascade: CascadeOutcome,
}

/// Per-restaurant lock map serializing invoice saves
#[derive(Clone, Default)]
struct RestaurantLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl RestaurantLocks {
    fn lock_for(&self, restaurant_id: i64) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().expect("restaurant lock map poisoned");
        map.entry(restaurant_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Ingestion service: standardizes invoice lines, updates ingredient prices
/// and cascades cost recomputes
#[derive(Clone)]
pub struct InvoiceService {
    db: Database,
    normalizer: UnitNormalizer,
    locks: RestaurantLocks,
}

impl InvoiceService {
    pub fn new(db: Database) -> Self {
        Self::with_normalizer(db, UnitNormalizer::default())
    }

    pub fn with_normalizer(db: Database, normalizer: UnitNormalizer) -> Self {
        Self {
            db,
            normalizer,
            locks: RestaurantLocks::default(),
        }
    }

    pub fn normalizer(&self) -> &UnitNormalizer {
        &self.normalizer
    }

    /// Save one invoice line for a restaurant.
    ///
    /// Standardizes the line, upserts the ingredient with its
    /// per-standard-unit price and last-ordered timestamp, then recomputes
    /// every menu item referencing the ingredient, recording cost history
    /// for real changes. The whole sequence holds the restaurant's lock and
    /// runs in a single transaction.
    pub fn save_invoice_line(
        &self,
        restaurant_id: i64,
        line: &InvoiceLine,
    ) -> Result<InvoiceSaveOutcome, InvoiceError> {
        if line.quantity <= 0.0 {
            return Err(InvoiceError::InvalidQuantity(line.quantity));
        }
        if line.total_cost < 0.0 {
            return Err(InvoiceError::InvalidCost(line.total_cost));
        }

        let standardized = self.normalizer.standardize_invoice_line(
            &line.ingredient_name,
            line.total_cost,
            line.quantity,
            &line.unit,
        );
        if !standardized.success {
            tracing::warn!(
                ingredient = %line.ingredient_name,
                unit = %line.unit,
                "invoice line standardization degraded; storing native figures"
            );
        }

        let restaurant_lock = self.locks.lock_for(restaurant_id);
        let _guard = restaurant_lock.lock().expect("restaurant lock poisoned");

        let known = self
            .db
            .with_conn(|conn| Ok(Restaurant::get_by_id(conn, restaurant_id)?.is_some()))?;
        if !known {
            return Err(InvoiceError::UnknownRestaurant(restaurant_id));
        }

        let normalizer = &self.normalizer;
        let ordered_at = Utc::now().to_rfc3339();
        let (ingredient, cascade) = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            // Snapshot stored menu-item costs before the price write, so the
            // recorded deltas reflect this save alone
            let snapshots =
                match Ingredient::get_by_name(&tx, restaurant_id, &standardized.name)? {
                    Some(existing) => snapshot_affected_menu_items(&tx, existing.id)?,
                    None => Vec::new(),
                };

            let ingredient =
                Ingredient::upsert_standardized(&tx, restaurant_id, &standardized, &ordered_at)?;

            let reason = format!("invoice: {}", ingredient.name);
            let cascade = cascade_recompute_with_snapshots(&tx, normalizer, &snapshots, &reason)?;

            tx.commit()?;
            Ok((ingredient, cascade))
        })?;

        Ok(InvoiceSaveOutcome {
            ingredient,
            standardized,
            cascade,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::{
        Component, ComponentCreate, ComponentIngredient, ComponentIngredientCreate, CostChange,
        MenuItem, MenuItemCreate, RestaurantCreate,
    };

    fn test_service() -> (tempfile::TempDir, InvoiceService) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("platecost.db")).unwrap();
        db.with_conn(run_migrations).unwrap();
        (dir, InvoiceService::new(db))
    }

    fn seed_restaurant(service: &InvoiceService) -> i64 {
        service
            .db
            .with_conn(|conn| {
                Ok(Restaurant::create(
                    conn,
                    &RestaurantCreate {
                        name: "Test Kitchen".to_string(),
                    },
                )?
                .id)
            })
            .unwrap()
    }

    #[test]
    fn test_save_rejects_invalid_input() {
        let (_dir, service) = test_service();
        let restaurant = seed_restaurant(&service);

        let bad_quantity = InvoiceLine {
            ingredient_name: "flour".to_string(),
            total_cost: 10.0,
            quantity: 0.0,
            unit: "lbs".to_string(),
        };
        assert!(matches!(
            service.save_invoice_line(restaurant, &bad_quantity),
            Err(InvoiceError::InvalidQuantity(_))
        ));

        let bad_cost = InvoiceLine {
            ingredient_name: "flour".to_string(),
            total_cost: -1.0,
            quantity: 5.0,
            unit: "lbs".to_string(),
        };
        assert!(matches!(
            service.save_invoice_line(restaurant, &bad_cost),
            Err(InvoiceError::InvalidCost(_))
        ));
    }

    #[test]
    fn test_save_unknown_restaurant() {
        let (_dir, service) = test_service();
        let line = InvoiceLine {
            ingredient_name: "flour".to_string(),
            total_cost: 10.0,
            quantity: 5.0,
            unit: "lbs".to_string(),
        };
        assert!(matches!(
            service.save_invoice_line(999, &line),
            Err(InvoiceError::UnknownRestaurant(999))
        ));
    }

    #[test]
    fn test_save_creates_standardized_ingredient() {
        let (_dir, service) = test_service();
        let restaurant = seed_restaurant(&service);

        // 50 lbs for $125.00 -> 800 oz at $0.15625/oz
        let line = InvoiceLine {
            ingredient_name: "flour".to_string(),
            total_cost: 125.0,
            quantity: 50.0,
            unit: "lbs".to_string(),
        };
        let outcome = service.save_invoice_line(restaurant, &line).unwrap();

        assert!(outcome.standardized.success);
        assert!((outcome.standardized.standard_quantity - 800.0).abs() < 1e-9);
        assert_eq!(outcome.ingredient.unit, "oz");
        assert!((outcome.ingredient.last_price - 0.15625).abs() < 1e-9);
        assert!(outcome.ingredient.last_ordered_at.is_some());
        // No menu structures yet, nothing to recompute
        assert_eq!(outcome.cascade.menu_items_recomputed, 0);
    }

    #[test]
    fn test_save_cascades_to_menu_items() {
        let (_dir, service) = test_service();
        let restaurant = seed_restaurant(&service);

        // First save establishes the ingredient
        let first = InvoiceLine {
            ingredient_name: "beef".to_string(),
            total_cost: 8.0,
            quantity: 16.0,
            unit: "oz".to_string(),
        };
        let ingredient_id = service
            .save_invoice_line(restaurant, &first)
            .unwrap()
            .ingredient
            .id;

        let menu_item_id = service
            .db
            .with_conn(|conn| {
                let item = MenuItem::create(
                    conn,
                    &MenuItemCreate {
                        restaurant_id: restaurant,
                        name: "Burger".to_string(),
                        price: 8.0,
                    },
                )?;
                let patty = Component::create(
                    conn,
                    &ComponentCreate {
                        menu_item_id: item.id,
                        name: "patty".to_string(),
                    },
                )?;
                ComponentIngredient::create(
                    conn,
                    &ComponentIngredientCreate {
                        component_id: patty.id,
                        ingredient_id,
                        quantity: 6.0,
                        unit: "oz".to_string(),
                    },
                )?;
                Ok(item.id)
            })
            .unwrap();

        // Price doubles: $0.50 -> $1.00 per oz
        let second = InvoiceLine {
            ingredient_name: "beef".to_string(),
            total_cost: 16.0,
            quantity: 16.0,
            unit: "oz".to_string(),
        };
        let outcome = service.save_invoice_line(restaurant, &second).unwrap();
        assert_eq!(outcome.cascade.menu_items_recomputed, 1);
        assert_eq!(outcome.cascade.changes_recorded, 1);

        service
            .db
            .with_conn(|conn| {
                let item = MenuItem::get_by_id(conn, menu_item_id)?.unwrap();
                assert!((item.cost - 6.0).abs() < 1e-9);

                let changes = CostChange::list_for_menu_item(conn, menu_item_id)?;
                assert_eq!(changes.len(), 1);
                // Snapshot was taken before the price write: old cost is the
                // stale cached 0.0, not a recomputed-then-diffed value
                assert!((changes[0].old_cost - 0.0).abs() < 1e-9);
                assert!((changes[0].new_cost - 6.0).abs() < 1e-9);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_concurrent_saves_are_serialized_per_restaurant() {
        let (_dir, service) = test_service();
        let restaurant = seed_restaurant(&service);

        // Establish the ingredient and a menu item depending on it
        let base = InvoiceLine {
            ingredient_name: "beef".to_string(),
            total_cost: 8.0,
            quantity: 16.0,
            unit: "oz".to_string(),
        };
        let ingredient_id = service
            .save_invoice_line(restaurant, &base)
            .unwrap()
            .ingredient
            .id;

        let menu_item_id = service
            .db
            .with_conn(|conn| {
                let item = MenuItem::create(
                    conn,
                    &MenuItemCreate {
                        restaurant_id: restaurant,
                        name: "Burger".to_string(),
                        price: 15.0,
                    },
                )?;
                let patty = Component::create(
                    conn,
                    &ComponentCreate {
                        menu_item_id: item.id,
                        name: "patty".to_string(),
                    },
                )?;
                ComponentIngredient::create(
                    conn,
                    &ComponentIngredientCreate {
                        component_id: patty.id,
                        ingredient_id,
                        quantity: 6.0,
                        unit: "oz".to_string(),
                    },
                )?;
                Ok(item.id)
            })
            .unwrap();

        // Two invoice saves for the same restaurant race; per-restaurant
        // serialization must prevent lost updates and stale history deltas
        let mut handles = Vec::new();
        for total_cost in [16.0, 32.0] {
            let service = service.clone();
            handles.push(std::thread::spawn(move || {
                let line = InvoiceLine {
                    ingredient_name: "beef".to_string(),
                    total_cost,
                    quantity: 16.0,
                    unit: "oz".to_string(),
                };
                service.save_invoice_line(restaurant, &line).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        service
            .db
            .with_conn(|conn| {
                let ingredient = Ingredient::get_by_id(conn, ingredient_id)?.unwrap();
                let item = MenuItem::get_by_id(conn, menu_item_id)?.unwrap();

                // The cached cost agrees with whichever price landed last
                assert!((item.cost - 6.0 * ingredient.last_price).abs() < 1e-9);

                // History deltas chain without gaps: each change starts where
                // the previous one ended
                let mut changes = CostChange::list_for_menu_item(conn, menu_item_id)?;
                changes.reverse(); // chronological order
                assert_eq!(changes.len(), 2);
                assert!((changes[0].old_cost - 0.0).abs() < 1e-9);
                for pair in changes.windows(2) {
                    assert!((pair[1].old_cost - pair[0].new_cost).abs() < 1e-9);
                }
                assert!((changes.last().unwrap().new_cost - item.cost).abs() < 1e-9);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_unknown_unit_save_still_produces_a_price() {
        let (_dir, service) = test_service();
        let restaurant = seed_restaurant(&service);

        let line = InvoiceLine {
            ingredient_name: "garlic".to_string(),
            total_cost: 3.0,
            quantity: 2.0,
            unit: "dash".to_string(),
        };
        let outcome = service.save_invoice_line(restaurant, &line).unwrap();
        // Weight fallback, treated as already-oz
        assert_eq!(outcome.ingredient.unit, "oz");
        assert!((outcome.ingredient.last_price - 1.5).abs() < 1e-9);
        assert!(outcome.standardized.message.is_some());
    }
}
