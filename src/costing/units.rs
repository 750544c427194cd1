//! Unit categories and conversion tables
//!
//! Provides the measurement categories and the static conversion factors used
//! to standardize purchase and recipe units.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Category of a measurement unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitCategory {
    /// Weight/mass units (oz, lb, g, kg) - standardized to ounces
    Weight,
    /// Volume units (fl oz, cup, tbsp, etc.) - standardized to fluid ounces
    Volume,
    /// Count/discrete units (each, piece) - never scaled
    Count,
    /// Ingredient-agnostic approximate units (clove, stick) with explicit factors
    Special,
}

impl UnitCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitCategory::Weight => "weight",
            UnitCategory::Volume => "volume",
            UnitCategory::Count => "count",
            UnitCategory::Special => "special",
        }
    }
}

/// Standard unit for the weight category
pub const WEIGHT_STANDARD_UNIT: &str = "oz";
/// Standard unit for the volume category
pub const VOLUME_STANDARD_UNIT: &str = "fl oz";
/// Standard unit for the count category
pub const COUNT_STANDARD_UNIT: &str = "each";

// ============================================================================
// Weight Conversion Constants (to ounces)
// ============================================================================

/// Ounces per pound
pub const OZ_PER_LB: f64 = 16.0;
/// Ounces per gram
pub const OZ_PER_G: f64 = 0.035274;
/// Ounces per kilogram
pub const OZ_PER_KG: f64 = 35.274;

// ============================================================================
// Volume Conversion Constants (to fluid ounces)
// ============================================================================

/// Fluid ounces per teaspoon
pub const FL_OZ_PER_TSP: f64 = 1.0 / 6.0;
/// Fluid ounces per tablespoon
pub const FL_OZ_PER_TBSP: f64 = 0.5;
/// Fluid ounces per cup (US)
pub const FL_OZ_PER_CUP: f64 = 8.0;
/// Fluid ounces per pint (US)
pub const FL_OZ_PER_PINT: f64 = 16.0;
/// Fluid ounces per quart (US)
pub const FL_OZ_PER_QUART: f64 = 32.0;
/// Fluid ounces per gallon (US)
pub const FL_OZ_PER_GALLON: f64 = 128.0;
/// Fluid ounces per milliliter
pub const FL_OZ_PER_ML: f64 = 0.033814;
/// Fluid ounces per liter
pub const FL_OZ_PER_LITER: f64 = 33.814;

/// A special unit with its own standard unit and an approximate factor to it.
///
/// Factors are ingredient-agnostic heuristics (1 clove of anything counts as
/// 0.1 oz), not precise conversions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialUnit {
    pub standard_unit: String,
    pub factor: f64,
}

impl SpecialUnit {
    fn oz(factor: f64) -> Self {
        Self {
            standard_unit: WEIGHT_STANDARD_UNIT.to_string(),
            factor,
        }
    }
}

/// Immutable unit conversion tables, constructed once and injected into the
/// normalizer so tests can substitute alternate tables.
#[derive(Debug, Clone)]
pub struct ConversionTables {
    weight: HashMap<String, f64>,
    volume: HashMap<String, f64>,
    count: HashMap<String, f64>,
    special: HashMap<String, SpecialUnit>,
}

impl ConversionTables {
    /// Build a table set from explicit maps (weight/volume factors are
    /// units-per-standard-unit; count factors are always 1.0)
    pub fn new(
        weight: HashMap<String, f64>,
        volume: HashMap<String, f64>,
        count: HashMap<String, f64>,
        special: HashMap<String, SpecialUnit>,
    ) -> Self {
        Self {
            weight,
            volume,
            count,
            special,
        }
    }

    /// The standard table set covering common purchase and recipe units
    pub fn standard() -> Self {
        let mut weight = HashMap::new();
        for alias in ["oz", "ounce", "ounces"] {
            weight.insert(alias.to_string(), 1.0);
        }
        for alias in ["lb", "lbs", "pound", "pounds"] {
            weight.insert(alias.to_string(), OZ_PER_LB);
        }
        for alias in ["g", "gram", "grams"] {
            weight.insert(alias.to_string(), OZ_PER_G);
        }
        for alias in ["kg", "kilogram", "kilograms"] {
            weight.insert(alias.to_string(), OZ_PER_KG);
        }

        let mut volume = HashMap::new();
        for alias in ["fl oz", "floz", "fluid ounce", "fluid ounces"] {
            volume.insert(alias.to_string(), 1.0);
        }
        for alias in ["tsp", "teaspoon", "teaspoons"] {
            volume.insert(alias.to_string(), FL_OZ_PER_TSP);
        }
        for alias in ["tbsp", "tablespoon", "tablespoons"] {
            volume.insert(alias.to_string(), FL_OZ_PER_TBSP);
        }
        for alias in ["cup", "cups"] {
            volume.insert(alias.to_string(), FL_OZ_PER_CUP);
        }
        for alias in ["pint", "pints"] {
            volume.insert(alias.to_string(), FL_OZ_PER_PINT);
        }
        for alias in ["quart", "quarts"] {
            volume.insert(alias.to_string(), FL_OZ_PER_QUART);
        }
        for alias in ["gallon", "gallons"] {
            volume.insert(alias.to_string(), FL_OZ_PER_GALLON);
        }
        for alias in ["ml", "milliliter", "milliliters"] {
            volume.insert(alias.to_string(), FL_OZ_PER_ML);
        }
        for alias in ["l", "liter", "liters"] {
            volume.insert(alias.to_string(), FL_OZ_PER_LITER);
        }

        let mut count = HashMap::new();
        for alias in [
            "each", "piece", "pieces", "item", "items", "count", "unit", "units",
        ] {
            count.insert(alias.to_string(), 1.0);
        }

        let mut special = HashMap::new();
        for alias in ["clove", "cloves"] {
            special.insert(alias.to_string(), SpecialUnit::oz(0.1));
        }
        for alias in ["slice", "slices"] {
            special.insert(alias.to_string(), SpecialUnit::oz(1.0));
        }
        for alias in ["stick", "sticks"] {
            special.insert(alias.to_string(), SpecialUnit::oz(4.0));
        }
        for alias in ["bunch", "bunches"] {
            special.insert(alias.to_string(), SpecialUnit::oz(6.0));
        }
        for alias in ["head", "heads"] {
            special.insert(alias.to_string(), SpecialUnit::oz(20.0));
        }
        for alias in ["sprig", "sprigs"] {
            special.insert(alias.to_string(), SpecialUnit::oz(0.1));
        }

        Self::new(weight, volume, count, special)
    }

    /// Look up the category of a normalized unit key, if recognized
    pub fn classify(&self, key: &str) -> Option<UnitCategory> {
        if self.weight.contains_key(key) {
            return Some(UnitCategory::Weight);
        }
        if self.volume.contains_key(key) {
            return Some(UnitCategory::Volume);
        }
        if self.count.contains_key(key) {
            return Some(UnitCategory::Count);
        }
        if self.special.contains_key(key) {
            return Some(UnitCategory::Special);
        }
        None
    }

    /// Ounces per one unit of a weight unit
    pub fn weight_factor(&self, key: &str) -> Option<f64> {
        self.weight.get(key).copied()
    }

    /// Fluid ounces per one unit of a volume unit
    pub fn volume_factor(&self, key: &str) -> Option<f64> {
        self.volume.get(key).copied()
    }

    /// Count units never scale; present means recognized
    pub fn count_factor(&self, key: &str) -> Option<f64> {
        self.count.get(key).copied()
    }

    /// Special unit entry with its standard unit and approximate factor
    pub fn special_unit(&self, key: &str) -> Option<&SpecialUnit> {
        self.special.get(key)
    }
}

impl Default for ConversionTables {
    fn default() -> Self {
        Self::standard()
    }
}

/// Normalize a raw unit string into a table key
pub fn normalize_key(unit: &str) -> String {
    unit.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_weight_units() {
        let tables = ConversionTables::standard();
        assert_eq!(tables.classify("oz"), Some(UnitCategory::Weight));
        assert_eq!(tables.classify("lbs"), Some(UnitCategory::Weight));
        assert_eq!(tables.classify("gram"), Some(UnitCategory::Weight));
        assert_eq!(tables.classify("kg"), Some(UnitCategory::Weight));
    }

    #[test]
    fn test_classify_volume_units() {
        let tables = ConversionTables::standard();
        assert_eq!(tables.classify("fl oz"), Some(UnitCategory::Volume));
        assert_eq!(tables.classify("cup"), Some(UnitCategory::Volume));
        assert_eq!(tables.classify("tbsp"), Some(UnitCategory::Volume));
        assert_eq!(tables.classify("ml"), Some(UnitCategory::Volume));
    }

    #[test]
    fn test_classify_count_units() {
        let tables = ConversionTables::standard();
        assert_eq!(tables.classify("each"), Some(UnitCategory::Count));
        assert_eq!(tables.classify("piece"), Some(UnitCategory::Count));
    }

    #[test]
    fn test_classify_special_units() {
        let tables = ConversionTables::standard();
        assert_eq!(tables.classify("clove"), Some(UnitCategory::Special));
        assert_eq!(tables.classify("stick"), Some(UnitCategory::Special));
    }

    #[test]
    fn test_unrecognized_unit_is_unclassified() {
        let tables = ConversionTables::standard();
        assert_eq!(tables.classify("gloop"), None);
        assert_eq!(tables.classify("dash"), None);
    }

    #[test]
    fn test_weight_factors() {
        let tables = ConversionTables::standard();
        assert_eq!(tables.weight_factor("oz"), Some(1.0));
        assert_eq!(tables.weight_factor("lb"), Some(OZ_PER_LB));
        assert_eq!(tables.weight_factor("cup"), None);
    }

    #[test]
    fn test_volume_factors() {
        let tables = ConversionTables::standard();
        assert_eq!(tables.volume_factor("fl oz"), Some(1.0));
        assert_eq!(tables.volume_factor("gallon"), Some(FL_OZ_PER_GALLON));
        assert_eq!(tables.volume_factor("lb"), None);
    }

    #[test]
    fn test_special_factor_is_approximate_oz() {
        let tables = ConversionTables::standard();
        let clove = tables.special_unit("clove").unwrap();
        assert_eq!(clove.standard_unit, WEIGHT_STANDARD_UNIT);
        assert!((clove.factor - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  LBS "), "lbs");
        assert_eq!(normalize_key("Fl Oz"), "fl oz");
    }
}
