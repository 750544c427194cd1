//! platecost library
//!
//! Restaurant cost management: invoice line standardization, ingredient price
//! tracking and multi-level recipe cost rollup.

pub mod build_info;
pub mod costing;
pub mod db;
pub mod invoice;
pub mod models;
