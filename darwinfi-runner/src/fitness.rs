//! Fitness function: weighted blend of scenario metrics into one score.

use darwinfi_core::domain::{FitnessReport, ScenarioMetrics};
use serde::{Deserialize, Serialize};

use crate::metrics::mean_f64;

/// Weights of the composite fitness score.
///
/// `score = total_return × r + sharpe × s − drawdown × d + win_rate × w`,
/// where `drawdown` is the worst drawdown of any scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitnessWeights {
    pub total_return: f64,
    pub sharpe: f64,
    pub drawdown: f64,
    pub win_rate: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            total_return: 0.4,
            sharpe: 0.3,
            drawdown: 0.2,
            win_rate: 0.1,
        }
    }
}

impl FitnessWeights {
    pub fn validate(&self) -> Result<(), String> {
        for (name, w) in [
            ("total_return", self.total_return),
            ("sharpe", self.sharpe),
            ("drawdown", self.drawdown),
            ("win_rate", self.win_rate),
        ] {
            if !w.is_finite() {
                return Err(format!("weights.{name} must be finite, got {w}"));
            }
        }
        Ok(())
    }

    pub fn score(
        &self,
        mean_total_return: f64,
        mean_sharpe: f64,
        worst_drawdown: f64,
        mean_win_rate: f64,
    ) -> f64 {
        self.total_return * mean_total_return + self.sharpe * mean_sharpe
            - self.drawdown * worst_drawdown
            + self.win_rate * mean_win_rate
    }

    /// Aggregate per-scenario metrics into a scored report.
    ///
    /// Each metric is the arithmetic mean across scenarios, except the score's
    /// drawdown term which uses the worst scenario.
    pub fn aggregate(&self, scenarios: Vec<ScenarioMetrics>) -> FitnessReport {
        let collect = |f: fn(&ScenarioMetrics) -> f64| -> Vec<f64> {
            scenarios.iter().map(f).collect()
        };

        let total_return = mean_f64(&collect(|s| s.total_return));
        let sharpe_ratio = mean_f64(&collect(|s| s.sharpe_ratio));
        let max_drawdown = mean_f64(&collect(|s| s.max_drawdown));
        let win_rate = mean_f64(&collect(|s| s.win_rate));
        let volatility = mean_f64(&collect(|s| s.volatility));
        let worst_drawdown = scenarios
            .iter()
            .map(|s| s.max_drawdown)
            .fold(0.0_f64, f64::max);
        let trade_count = scenarios.iter().map(|s| s.trade_count).sum();

        FitnessReport {
            total_return,
            sharpe_ratio,
            max_drawdown,
            win_rate,
            volatility,
            worst_drawdown,
            trade_count,
            fitness_score: self.score(total_return, sharpe_ratio, worst_drawdown, win_rate),
            scenarios,
            failed: false,
            failure_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(name: &str, ret: f64, sharpe: f64, dd: f64, wr: f64) -> ScenarioMetrics {
        ScenarioMetrics {
            scenario: name.into(),
            total_return: ret,
            sharpe_ratio: sharpe,
            max_drawdown: dd,
            win_rate: wr,
            volatility: 0.01,
            trade_count: 10,
            final_capital: 10_000.0 * (1.0 + ret),
        }
    }

    #[test]
    fn default_weights() {
        let w = FitnessWeights::default();
        assert_eq!((w.total_return, w.sharpe, w.drawdown, w.win_rate), (0.4, 0.3, 0.2, 0.1));
    }

    #[test]
    fn aggregate_uses_means_and_worst_drawdown() {
        let report = FitnessWeights::default().aggregate(vec![
            metrics("bull", 0.10, 1.0, 0.05, 0.6),
            metrics("bear", -0.05, -0.5, 0.20, 0.4),
        ]);
        assert!((report.total_return - 0.025).abs() < 1e-12);
        assert!((report.sharpe_ratio - 0.25).abs() < 1e-12);
        assert!((report.max_drawdown - 0.125).abs() < 1e-12);
        assert!((report.worst_drawdown - 0.20).abs() < 1e-12);
        assert!((report.win_rate - 0.5).abs() < 1e-12);
        assert_eq!(report.trade_count, 20);

        let expected = 0.4 * 0.025 + 0.3 * 0.25 - 0.2 * 0.20 + 0.1 * 0.5;
        assert!((report.fitness_score - expected).abs() < 1e-9);
        assert!(!report.failed);
    }

    #[test]
    fn custom_weights_change_score() {
        let w = FitnessWeights {
            total_return: 1.0,
            sharpe: 0.0,
            drawdown: 0.0,
            win_rate: 0.0,
        };
        let report = w.aggregate(vec![metrics("x", 0.3, 9.0, 0.9, 1.0)]);
        assert!((report.fitness_score - 0.3).abs() < 1e-12);
    }

    #[test]
    fn empty_aggregate_is_zero() {
        let report = FitnessWeights::default().aggregate(Vec::new());
        assert_eq!(report.fitness_score, 0.0);
        assert_eq!(report.trade_count, 0);
    }

    #[test]
    fn non_finite_weight_is_invalid() {
        let w = FitnessWeights {
            sharpe: f64::NAN,
            ..Default::default()
        };
        assert!(w.validate().is_err());
    }
}
