//! DarwinFi Runner: fitness evaluation and the evolution loop.
//!
//! This crate builds on `darwinfi-core` to provide:
//! - Scenario simulation and performance metrics
//! - Weighted multi-scenario fitness scoring (parallel via rayon)
//! - Population ranking, elitism and truncation selection
//! - Crossover, mutation and market specialization operators
//! - The generation-cycle state machine and the `evolve` driver
//! - Evolution history with JSONL persistence

pub mod config;
pub mod controller;
pub mod evaluator;
pub mod fitness;
pub mod history;
pub mod metrics;
pub mod operators;
pub mod population;
pub mod simulator;

pub use config::{ConfigError, EvolutionConfig, SimulationConfig};
pub use controller::{
    CycleOutcome, CycleReport, EvolutionController, EvolutionError, EvolutionProgress,
    EvolutionRun, EvolutionState, OffspringCounts, SkipReason, SkippedCycle, StopReason,
    MIN_PARENTS,
};
pub use evaluator::FitnessEvaluator;
pub use fitness::FitnessWeights;
pub use history::{EvolutionHistory, GenerationStats};
pub use operators::{crossover, mutate, specialize, CrossoverPolicy, GeneCrossover, GeneOverrides};
pub use population::{DiversityMetrics, FitnessStats, Population};
pub use simulator::{simulate_scenario, SimulationError, TradeExit};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn controller_is_send_sync() {
        assert_send::<EvolutionController>();
        assert_sync::<EvolutionController>();
    }

    #[test]
    fn evaluator_is_send_sync() {
        assert_send::<FitnessEvaluator>();
        assert_sync::<FitnessEvaluator>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<EvolutionConfig>();
        assert_sync::<EvolutionConfig>();
        assert_send::<CrossoverPolicy>();
        assert_sync::<CrossoverPolicy>();
        assert_send::<GeneOverrides>();
        assert_sync::<GeneOverrides>();
    }

    #[test]
    fn population_is_send_sync() {
        assert_send::<Population>();
        assert_sync::<Population>();
    }

    #[test]
    fn run_results_are_send_sync() {
        assert_send::<EvolutionRun>();
        assert_sync::<EvolutionRun>();
        assert_send::<EvolutionProgress>();
        assert_sync::<EvolutionProgress>();
        assert_send::<CycleOutcome>();
        assert_sync::<CycleOutcome>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<EvolutionError>();
        assert_sync::<EvolutionError>();
        assert_send::<SimulationError>();
        assert_sync::<SimulationError>();
    }
}
