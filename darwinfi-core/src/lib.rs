//! DarwinFi Core: strategy genome, market scenarios, trade instructions.
//!
//! This crate holds the plain data side of the evolution engine:
//! - Strategy genome with typed, bounded genes and immutable lineage
//! - Fitness report data types
//! - Market scenarios, the scenario provider seam, and a CSV price adapter
//! - Position sizing and abstract entry/exit instructions
//! - Deterministic RNG hierarchy

pub mod data;
pub mod domain;
pub mod genome;
pub mod instructions;
pub mod rng;
pub mod scenario;
pub mod sizing;

pub use domain::{FitnessReport, GenomeId, ScenarioMetrics, FAILED_FITNESS};
pub use genome::{
    CategoricalGene, EntryMethod, ExitMethod, GeneBounds, GeneChoice, Genes, GenomeError,
    NumericGene, RiskManagement, StrategyGenome, Timeframe,
};
pub use instructions::{entry_parameters, exit_parameters, Direction, MarketContext, TradeInstruction};
pub use rng::RngHierarchy;
pub use scenario::{
    MarketCondition, MarketScenario, PresetScenarios, ScenarioError, ScenarioPreset,
    ScenarioProvider, StaticScenarios,
};
