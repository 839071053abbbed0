//! Domain types shared across the engine.

pub mod fitness;
pub mod ids;

pub use fitness::{FitnessReport, ScenarioMetrics, FAILED_FITNESS};
pub use ids::GenomeId;
