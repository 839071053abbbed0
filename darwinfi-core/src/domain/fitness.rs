//! FitnessReport: the scored outcome of evaluating one genome.
//!
//! These are plain data types. The simulation and the weighted score live in
//! `darwinfi-runner`; they are defined here because a genome carries its report.

use serde::{Deserialize, Serialize};

/// Score assigned to a genome whose evaluation failed.
///
/// Finite so reports stay JSON-serializable, and far below any score a real
/// simulation can reach.
pub const FAILED_FITNESS: f64 = -1.0e9;

/// Metrics for a single scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub scenario: String,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    /// Peak-to-trough loss as a positive fraction (0.15 = 15% drawdown).
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub volatility: f64,
    pub trade_count: usize,
    pub final_capital: f64,
}

/// Aggregate fitness across all scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessReport {
    // ── Scenario means ──
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub volatility: f64,

    /// Worst drawdown of any single scenario. This is the drawdown term the
    /// score penalises.
    pub worst_drawdown: f64,
    pub trade_count: usize,

    pub fitness_score: f64,

    pub scenarios: Vec<ScenarioMetrics>,

    /// Set when evaluation raised an error and the score is `FAILED_FITNESS`.
    #[serde(default)]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl FitnessReport {
    /// Minimal report for a genome whose simulation could not run.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            total_return: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            win_rate: 0.0,
            volatility: 0.0,
            worst_drawdown: 0.0,
            trade_count: 0,
            fitness_score: FAILED_FITNESS,
            scenarios: Vec::new(),
            failed: true,
            failure_reason: Some(reason.into()),
        }
    }

    /// Whether this report may be used for ranking and parent selection.
    pub fn is_usable(&self) -> bool {
        !self.failed && self.fitness_score.is_finite()
    }
}
