//! Cost rollup engine
//!
//! Pure aggregation of ingredient line costs into component costs and
//! component costs into menu-item costs, plus change detection for cost
//! history. Storage-backed recompute lives in the models layer; everything
//! here operates on caller-supplied data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::normalizer::UnitNormalizer;

/// Cost changes at or below one cent are floating-point noise, not changes
pub const COST_EPSILON: f64 = 0.01;

/// Policy applied when a recipe line's unit cannot be standardized.
///
/// Naive multiplication silently assumes the recipe unit equals the
/// ingredient's standard unit, which may be wrong; it is a known imprecision,
/// kept as an explicit named policy rather than an incidental branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionFailurePolicy {
    #[default]
    DegradeToNaiveMultiplication,
    ZeroCost,
}

/// One recipe line: a quantity of an ingredient priced per standard unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeLine {
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: String,
    /// Price per one standard unit of the ingredient; <= 0 means unpriced
    pub unit_price: f64,
}

/// Snapshot of a menu item's stored cost, taken before any price mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItemSnapshot {
    pub menu_item_id: i64,
    pub cost_before: f64,
}

/// Verdict of a menu-item recompute against its snapshotted cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecomputeOutcome {
    pub new_cost: f64,
    pub changed: bool,
    pub delta: f64,
}

/// Cost of a single recipe line.
///
/// Standardizes the recipe quantity and multiplies by the per-standard-unit
/// price; on conversion failure applies the policy with a logged warning.
pub fn line_cost(
    normalizer: &UnitNormalizer,
    line: &RecipeLine,
    policy: ConversionFailurePolicy,
) -> f64 {
    let converted = normalizer.to_standard_unit(line.quantity, &line.unit);
    if converted.success {
        return converted.quantity * line.unit_price;
    }

    match policy {
        ConversionFailurePolicy::DegradeToNaiveMultiplication => {
            tracing::warn!(
                ingredient = %line.ingredient_name,
                unit = %line.unit,
                "conversion failed; degrading to naive quantity * price"
            );
            line.quantity * line.unit_price
        }
        ConversionFailurePolicy::ZeroCost => {
            tracing::warn!(
                ingredient = %line.ingredient_name,
                unit = %line.unit,
                "conversion failed; costing line at zero"
            );
            0.0
        }
    }
}

/// Total cost of a component's ingredient lines.
///
/// Lines whose ingredient has no recorded price contribute 0; the component
/// then has incomplete costing, which callers surface via
/// [`unpriced_ingredients`].
pub fn component_cost(
    normalizer: &UnitNormalizer,
    lines: &[RecipeLine],
    policy: ConversionFailurePolicy,
) -> f64 {
    lines
        .iter()
        .filter(|line| line.unit_price > 0.0)
        .map(|line| line_cost(normalizer, line, policy))
        .sum()
}

/// Names of ingredients contributing nothing because they have no price
pub fn unpriced_ingredients(lines: &[RecipeLine]) -> Vec<&str> {
    lines
        .iter()
        .filter(|line| line.unit_price <= 0.0)
        .map(|line| line.ingredient_name.as_str())
        .collect()
}

/// Menu-item cost is the sum of its components' costs
pub fn menu_item_cost(component_costs: &[f64]) -> f64 {
    component_costs.iter().sum()
}

/// Profit margin `(price - cost) / price`; None when price is non-positive
pub fn margin(price: f64, cost: f64) -> Option<f64> {
    if price > 0.0 {
        Some((price - cost) / price)
    } else {
        None
    }
}

/// Deduplicate menu-item references and capture each item's stored cost.
///
/// The first-seen cost per menu item wins; the snapshot must be taken before
/// the triggering price mutation so before/after deltas are correct.
pub fn affected_menu_items<I>(refs: I) -> Vec<MenuItemSnapshot>
where
    I: IntoIterator<Item = (i64, f64)>,
{
    let mut seen: BTreeMap<i64, f64> = BTreeMap::new();
    for (menu_item_id, cost) in refs {
        seen.entry(menu_item_id).or_insert(cost);
    }
    seen.into_iter()
        .map(|(menu_item_id, cost_before)| MenuItemSnapshot {
            menu_item_id,
            cost_before,
        })
        .collect()
}

/// Recompute a menu item's cost and compare against its snapshot.
///
/// `changed` gates cost-history writes: deltas of one cent or less are
/// treated as unchanged.
pub fn recompute_and_diff(old_cost: f64, component_costs: &[f64]) -> RecomputeOutcome {
    let new_cost = menu_item_cost(component_costs);
    let delta = new_cost - old_cost;
    RecomputeOutcome {
        new_cost,
        changed: delta.abs() > COST_EPSILON,
        delta,
    }
}
