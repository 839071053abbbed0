//! Fitness evaluator: scores genomes against a fixed scenario set.
//!
//! Each (genome, scenario) pair draws from its own RNG, derived from the
//! master seed, the genome id and the scenario index. Scores therefore do
//! not depend on evaluation order or on how many threads run it.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use darwinfi_core::domain::{FitnessReport, ScenarioMetrics};
use darwinfi_core::genome::StrategyGenome;
use darwinfi_core::rng::RngHierarchy;
use darwinfi_core::scenario::{MarketScenario, ScenarioProvider};

use crate::config::SimulationConfig;
use crate::fitness::FitnessWeights;
use crate::simulator::{simulate_scenario, SimulationError};

const EVAL_STREAM: &str = "evaluate";

#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    scenarios: Vec<MarketScenario>,
    simulation: SimulationConfig,
    weights: FitnessWeights,
    rng: RngHierarchy,
}

impl FitnessEvaluator {
    pub fn new(
        provider: &dyn ScenarioProvider,
        simulation: SimulationConfig,
        weights: FitnessWeights,
        master_seed: u64,
    ) -> Self {
        Self {
            scenarios: provider.scenarios(),
            simulation,
            weights,
            rng: RngHierarchy::new(master_seed),
        }
    }

    pub fn scenarios(&self) -> &[MarketScenario] {
        &self.scenarios
    }

    pub fn weights(&self) -> &FitnessWeights {
        &self.weights
    }

    /// Simulate every scenario and aggregate, propagating the first failure.
    pub fn try_evaluate(&self, genome: &StrategyGenome) -> Result<FitnessReport, SimulationError> {
        if self.scenarios.is_empty() {
            return Err(SimulationError::NoScenarios);
        }
        genome.genes().validate()?;

        let per_scenario = self
            .scenarios
            .iter()
            .enumerate()
            .map(|(i, scenario)| {
                let mut rng = self.rng.rng_for(EVAL_STREAM, genome.id().as_str(), i as u64);
                simulate_scenario(genome.genes(), scenario, &self.simulation, &mut rng)
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some((scenario, metric)) = per_scenario.iter().find_map(non_finite_metric) {
            return Err(SimulationError::NonFinite {
                scenario: scenario.to_string(),
                metric,
            });
        }

        let report = self.weights.aggregate(per_scenario);
        if !report.fitness_score.is_finite() {
            return Err(SimulationError::NonFinite {
                scenario: "aggregate".to_string(),
                metric: "fitness_score",
            });
        }
        Ok(report)
    }

    /// Score a genome. Failures are logged and yield a failed report.
    pub fn evaluate(&self, genome: &StrategyGenome) -> FitnessReport {
        match self.try_evaluate(genome) {
            Ok(report) => {
                debug!(
                    genome = %genome.id().short(),
                    fitness = report.fitness_score,
                    trades = report.trade_count,
                    "genome evaluated"
                );
                report
            }
            Err(e) => {
                warn!(genome = %genome.id(), error = %e, "evaluation failed, assigning failure score");
                FitnessReport::failed(e.to_string())
            }
        }
    }

    /// Attach a report to every genome that lacks one.
    ///
    /// Already-scored genomes pass through untouched.
    pub fn score_all(
        &self,
        genomes: Vec<StrategyGenome>,
        pool: Option<&rayon::ThreadPool>,
    ) -> Vec<StrategyGenome> {
        // Without a cancel flag every genome is scored.
        self.evaluate_all(genomes, pool, None).unwrap_or_default()
    }

    /// Cancellable [`Self::score_all`]. Returns `None` if
    /// `cancel` was raised before every genome was scored.
    pub fn evaluate_all(
        &self,
        genomes: Vec<StrategyGenome>,
        pool: Option<&rayon::ThreadPool>,
        cancel: Option<&AtomicBool>,
    ) -> Option<Vec<StrategyGenome>> {
        let score = |genome: StrategyGenome| -> Option<StrategyGenome> {
            if genome.is_evaluated() {
                return Some(genome);
            }
            if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                return None;
            }
            let report = self.evaluate(&genome);
            Some(genome.with_fitness(report))
        };

        match pool {
            Some(tp) => tp.install(|| genomes.into_par_iter().map(score).collect()),
            None => genomes.into_par_iter().map(score).collect(),
        }
    }
}

/// First metric of a scenario run that overflowed or went NaN.
fn non_finite_metric(m: &ScenarioMetrics) -> Option<(&str, &'static str)> {
    [
        ("total_return", m.total_return),
        ("sharpe_ratio", m.sharpe_ratio),
        ("max_drawdown", m.max_drawdown),
        ("win_rate", m.win_rate),
        ("volatility", m.volatility),
        ("final_capital", m.final_capital),
    ]
    .into_iter()
    .find(|(_, v)| !v.is_finite())
    .map(|(name, _)| (m.scenario.as_str(), name))
}
