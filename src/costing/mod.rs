//! Cost engine module
//!
//! Unit standardization and recipe cost rollup.

pub mod normalizer;
pub mod rollup;
pub mod units;

pub use normalizer::{DefaultCategoryPolicy, Standardized, StandardizedLine, UnitNormalizer};
pub use rollup::{
    affected_menu_items, component_cost, line_cost, margin, menu_item_cost, recompute_and_diff,
    unpriced_ingredients, ConversionFailurePolicy, MenuItemSnapshot, RecipeLine, RecomputeOutcome,
    COST_EPSILON,
};
pub use units::{
    normalize_key, ConversionTables, SpecialUnit, UnitCategory, COUNT_STANDARD_UNIT,
    VOLUME_STANDARD_UNIT, WEIGHT_STANDARD_UNIT,
};
