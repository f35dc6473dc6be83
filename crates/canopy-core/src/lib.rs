//! Stratified domain estimation engine for forest-inventory sample data.
//!
//! Pipeline (left to right):
//!   evaluation selection → stratification → domain indicators →
//!   two-stage aggregation → stratum statistics → population estimate.
//!
//! The orchestrating entry point is [`estimator::Estimator`]; everything it
//! needs is resolved up front into an immutable [`scope::EstimationScope`].

pub mod aggregate;
pub mod cache;
pub mod columns;
pub mod config;
pub mod domain;
pub mod error;
pub mod estimator;
pub mod evaluation;
pub mod measure;
pub mod output;
pub mod population;
pub mod scope;
pub mod stats;
pub mod stratification;
pub mod synthetic;
pub mod tables;
pub mod value;

pub use cache::{CacheKey, EstimateCache};
pub use config::{
    EstimationConfig, EstimationJob, EstimationMode, LandType, MeasureKind, UncertaintyOutput,
    UniverseRule,
};
pub use error::{EstimationError, Result};
pub use estimator::Estimator;
pub use evaluation::{select_evaluations, EvaluationRequest};
pub use output::{EstimateRow, EstimateTable, Uncertainty};
pub use scope::EstimationScope;
pub use stratification::{Stratum, StratificationTable};
pub use tables::InventoryTables;
pub use value::Value;
