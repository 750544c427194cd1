//! Unit normalizer
//!
//! Classifies unit strings into measurement categories and converts quantities
//! into each category's standard unit, deriving per-standard-unit prices for
//! invoice lines. Conversion failures are values with a success flag, never
//! panics: manual data entry produces typo'd units and the system must keep
//! producing a best-effort standardized figure.

use serde::{Deserialize, Serialize};

use super::units::{
    normalize_key, ConversionTables, UnitCategory, COUNT_STANDARD_UNIT, VOLUME_STANDARD_UNIT,
    WEIGHT_STANDARD_UNIT,
};

/// Policy for units absent from every conversion table.
///
/// Unknown units are treated as weight (already-oz) by default; the fallback
/// category is a named, injectable policy so it can be tested with
/// alternates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultCategoryPolicy {
    pub fallback: UnitCategory,
}

impl Default for DefaultCategoryPolicy {
    fn default() -> Self {
        Self {
            fallback: UnitCategory::Weight,
        }
    }
}

/// Result of converting a quantity to its category's standard unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standardized {
    pub quantity: f64,
    pub unit: String,
    pub category: UnitCategory,
    pub factor: f64,
    pub success: bool,
    /// Diagnostic for fallbacks and failures; None on a clean conversion
    pub message: Option<String>,
}

/// An invoice line with both native and standardized pricing, so callers can
/// persist the standardized price while keeping an audit trail of the
/// original invoice units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardizedLine {
    pub name: String,
    pub native_quantity: f64,
    pub native_unit: String,
    pub native_unit_cost: f64,
    pub standard_quantity: f64,
    pub standard_unit: String,
    pub standard_unit_cost: f64,
    pub category: UnitCategory,
    pub factor: f64,
    pub success: bool,
    pub message: Option<String>,
}

/// Converts arbitrary purchase/recipe units into per-category standard units
#[derive(Debug, Clone, Default)]
pub struct UnitNormalizer {
    tables: ConversionTables,
    default_category: DefaultCategoryPolicy,
}

impl UnitNormalizer {
    pub fn new(tables: ConversionTables) -> Self {
        Self {
            tables,
            default_category: DefaultCategoryPolicy::default(),
        }
    }

    pub fn with_policy(tables: ConversionTables, default_category: DefaultCategoryPolicy) -> Self {
        Self {
            tables,
            default_category,
        }
    }

    /// Classify a unit string into its measurement category.
    ///
    /// Unrecognized units fall back to the policy category (weight by default)
    /// with a logged diagnostic; classification never fails.
    pub fn classify_unit(&self, unit: &str) -> UnitCategory {
        let key = normalize_key(unit);
        match self.tables.classify(&key) {
            Some(category) => category,
            None => {
                tracing::warn!(
                    unit = %key,
                    fallback = self.default_category.fallback.as_str(),
                    "unit unrecognized, defaulted"
                );
                self.default_category.fallback
            }
        }
    }

    /// Standard unit for a category. Special units carry their own standard
    /// unit in the table; an unknown special unit falls back to "oz".
    pub fn standard_unit_for(&self, category: UnitCategory, unit: &str) -> String {
        match category {
            UnitCategory::Weight => WEIGHT_STANDARD_UNIT.to_string(),
            UnitCategory::Volume => VOLUME_STANDARD_UNIT.to_string(),
            UnitCategory::Count => COUNT_STANDARD_UNIT.to_string(),
            UnitCategory::Special => {
                let key = normalize_key(unit);
                self.tables
                    .special_unit(&key)
                    .map(|s| s.standard_unit.clone())
                    .unwrap_or_else(|| WEIGHT_STANDARD_UNIT.to_string())
            }
        }
    }

    /// Convert a quantity into its category's standard unit.
    ///
    /// Unknown units standardize best-effort: fallback category, factor 1.0
    /// (treated as already-standard), success true with a diagnostic message.
    /// A non-positive table factor is a genuine table gap and yields
    /// `success: false` with the original quantity/unit unchanged; callers
    /// choose degraded behavior from there.
    pub fn to_standard_unit(&self, quantity: f64, from_unit: &str) -> Standardized {
        let key = normalize_key(from_unit);

        match self.tables.classify(&key) {
            Some(UnitCategory::Weight) => match self.tables.weight_factor(&key) {
                Some(factor) if factor > 0.0 => Standardized {
                    quantity: quantity * factor,
                    unit: WEIGHT_STANDARD_UNIT.to_string(),
                    category: UnitCategory::Weight,
                    factor,
                    success: true,
                    message: None,
                },
                _ => self.table_gap(quantity, &key, UnitCategory::Weight),
            },
            Some(UnitCategory::Volume) => match self.tables.volume_factor(&key) {
                Some(factor) if factor > 0.0 => Standardized {
                    quantity: quantity * factor,
                    unit: VOLUME_STANDARD_UNIT.to_string(),
                    category: UnitCategory::Volume,
                    factor,
                    success: true,
                    message: None,
                },
                _ => self.table_gap(quantity, &key, UnitCategory::Volume),
            },
            // Count units never scale. Cross-unit count conversion (e.g.
            // "piece" of a different size than "each") is not supported; the
            // quantity passes through with the limitation flagged.
            Some(UnitCategory::Count) => Standardized {
                quantity,
                unit: COUNT_STANDARD_UNIT.to_string(),
                category: UnitCategory::Count,
                factor: 1.0,
                success: true,
                message: if key == COUNT_STANDARD_UNIT {
                    None
                } else {
                    Some(format!(
                        "count unit '{}' treated as '{}'; count units do not convert",
                        key, COUNT_STANDARD_UNIT
                    ))
                },
            },
            Some(UnitCategory::Special) => match self.tables.special_unit(&key) {
                Some(special) if special.factor > 0.0 => Standardized {
                    quantity: quantity * special.factor,
                    unit: special.standard_unit.clone(),
                    category: UnitCategory::Special,
                    factor: special.factor,
                    success: true,
                    message: Some(format!(
                        "special unit '{}': approximate factor {} {} per unit",
                        key, special.factor, special.standard_unit
                    )),
                },
                _ => self.table_gap(quantity, &key, UnitCategory::Special),
            },
            None => {
                let fallback = self.default_category.fallback;
                let standard_unit = self.standard_unit_for(fallback, &key);
                tracing::warn!(
                    unit = %key,
                    fallback = fallback.as_str(),
                    "unit unrecognized, defaulted"
                );
                Standardized {
                    quantity,
                    unit: standard_unit.clone(),
                    category: fallback,
                    factor: 1.0,
                    success: true,
                    message: Some(format!(
                        "unrecognized unit '{}' defaulted to {} ({})",
                        key,
                        fallback.as_str(),
                        standard_unit
                    )),
                }
            }
        }
    }

    /// Failure value for a recognized unit with no usable factor. Should not
    /// occur with the standard tables; guards injected/alternate ones.
    fn table_gap(&self, quantity: f64, key: &str, category: UnitCategory) -> Standardized {
        tracing::warn!(
            unit = %key,
            category = category.as_str(),
            "conversion table gap; returning unconverted quantity"
        );
        Standardized {
            quantity,
            unit: key.to_string(),
            category,
            factor: 0.0,
            success: false,
            message: Some(format!(
                "no usable conversion factor for '{}' in the {} table",
                key,
                category.as_str()
            )),
        }
    }

    /// Cost of a recipe quantity at a per-standard-unit price.
    ///
    /// Returns 0.0 when conversion fails; callers wanting the naive
    /// multiplication fallback use `rollup::line_cost` with its policy.
    pub fn standardized_unit_cost(
        &self,
        recipe_quantity: f64,
        recipe_unit: &str,
        standard_unit_price: f64,
    ) -> f64 {
        let converted = self.to_standard_unit(recipe_quantity, recipe_unit);
        if converted.success {
            converted.quantity * standard_unit_price
        } else {
            0.0
        }
    }

    /// Standardize an invoice line for ingestion.
    ///
    /// Assumes `quantity > 0` (validated by the caller before invoking).
    pub fn standardize_invoice_line(
        &self,
        name: &str,
        total_cost: f64,
        quantity: f64,
        unit: &str,
    ) -> StandardizedLine {
        let native_unit_cost = total_cost / quantity;
        let converted = self.to_standard_unit(quantity, unit);

        if converted.success && converted.quantity > 0.0 {
            StandardizedLine {
                name: name.to_string(),
                native_quantity: quantity,
                native_unit: normalize_key(unit),
                native_unit_cost,
                standard_quantity: converted.quantity,
                standard_unit: converted.unit,
                standard_unit_cost: total_cost / converted.quantity,
                category: converted.category,
                factor: converted.factor,
                success: true,
                message: converted.message,
            }
        } else {
            // Degraded: standardized figures mirror the native ones so the
            // caller still has something persistable with an audit trail.
            StandardizedLine {
                name: name.to_string(),
                native_quantity: quantity,
                native_unit: normalize_key(unit),
                native_unit_cost,
                standard_quantity: quantity,
                standard_unit: normalize_key(unit),
                standard_unit_cost: native_unit_cost,
                category: converted.category,
                factor: converted.factor,
                success: false,
                message: converted.message,
            }
        }
    }
}
