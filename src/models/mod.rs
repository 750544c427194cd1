//! Data models
//!
//! Rust structs representing database entities.

mod component;
mod component_ingredient;
mod cost_change;
mod ingredient;
mod menu_item;
mod restaurant;

pub use component::{Component, ComponentCreate, ComponentUpdate};
pub use component_ingredient::{
    cascade_recompute_from_ingredient, cascade_recompute_with_snapshots, compute_component_cost,
    compute_menu_item_cost, recompute_component_cost, recompute_menu_item_cost,
    snapshot_affected_menu_items, CascadeOutcome, ComponentIngredient, ComponentIngredientCreate,
    ComponentIngredientDetail, ComponentIngredientUpdate, SkippedMenuItem,
};
pub use cost_change::{CostChange, CostChangeCreate};
pub use ingredient::{Ingredient, IngredientCreate, IngredientUpdate};
pub use menu_item::{MenuItem, MenuItemCreate, MenuItemUpdate};
pub use restaurant::{Restaurant, RestaurantCreate};
