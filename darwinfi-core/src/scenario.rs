//! Market scenarios: the synthetic or historical market profiles genomes are
//! evaluated against.
//!
//! A scenario is either a `(volatility, trend)` pair from which the simulator
//! draws random per-period moves, or a recorded series of moves that is replayed
//! verbatim (see [`crate::data::load_price_csv`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors building a scenario from historical prices.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("need at least {min} prices, got {got}")]
    TooFewPrices { min: usize, got: usize },

    #[error("price at row {row} is not a positive finite number: {value}")]
    InvalidPrice { row: usize, value: f64 },
}

/// A named market-condition profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketScenario {
    pub name: String,
    /// Per-period move amplitude. Must be non-negative.
    pub volatility: f64,
    /// Signed drift per period.
    pub trend: f64,
    /// Recorded per-period returns. When present the simulator replays these
    /// instead of drawing random moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moves: Option<Vec<f64>>,
}

impl MarketScenario {
    pub fn synthetic(name: impl Into<String>, volatility: f64, trend: f64) -> Self {
        Self {
            name: name.into(),
            volatility,
            trend,
            moves: None,
        }
    }

    /// Build a replayable scenario from a closing-price series.
    ///
    /// `volatility` and `trend` are the sample standard deviation and mean of
    /// the period returns, kept for reporting.
    pub fn from_prices(name: impl Into<String>, prices: &[f64]) -> Result<Self, ScenarioError> {
        if prices.len() < 2 {
            return Err(ScenarioError::TooFewPrices {
                min: 2,
                got: prices.len(),
            });
        }
        if let Some((row, &value)) = prices
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p <= 0.0)
        {
            return Err(ScenarioError::InvalidPrice { row, value });
        }

        let moves: Vec<f64> = prices.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let trend = moves.iter().sum::<f64>() / moves.len() as f64;
        let volatility = if moves.len() < 2 {
            0.0
        } else {
            let var = moves.iter().map(|m| (m - trend).powi(2)).sum::<f64>()
                / (moves.len() - 1) as f64;
            var.sqrt()
        };

        Ok(Self {
            name: name.into(),
            volatility,
            trend,
            moves: Some(moves),
        })
    }

    pub fn is_historical(&self) -> bool {
        self.moves.is_some()
    }

    /// Describe the first structural problem with this scenario, if any.
    pub fn validate(&self) -> Result<(), String> {
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(format!(
                "scenario '{}': volatility must be a non-negative finite number, got {}",
                self.name, self.volatility
            ));
        }
        if !self.trend.is_finite() {
            return Err(format!(
                "scenario '{}': trend must be finite, got {}",
                self.name, self.trend
            ));
        }
        if let Some(moves) = &self.moves {
            if moves.is_empty() {
                return Err(format!("scenario '{}': recorded series is empty", self.name));
            }
            if let Some(bad) = moves.iter().find(|m| !m.is_finite()) {
                return Err(format!(
                    "scenario '{}': recorded move is not finite: {bad}",
                    self.name
                ));
            }
        }
        Ok(())
    }
}

/// Regime a strategy can be specialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketCondition {
    Bull,
    Bear,
    Sideways,
    Volatile,
}

impl MarketCondition {
    pub const ALL: [MarketCondition; 4] = [
        MarketCondition::Bull,
        MarketCondition::Bear,
        MarketCondition::Sideways,
        MarketCondition::Volatile,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Bull => "bull",
            Self::Bear => "bear",
            Self::Sideways => "sideways",
            Self::Volatile => "volatile",
        }
    }
}

impl fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The five fixed evaluation presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioPreset {
    Bull,
    Bear,
    Sideways,
    Volatile,
    FlashCrash,
}

impl ScenarioPreset {
    pub const ALL: [ScenarioPreset; 5] = [
        ScenarioPreset::Bull,
        ScenarioPreset::Bear,
        ScenarioPreset::Sideways,
        ScenarioPreset::Volatile,
        ScenarioPreset::FlashCrash,
    ];

    pub fn scenario(&self) -> MarketScenario {
        match self {
            Self::Bull => MarketScenario::synthetic("bull", 0.02, 0.005),
            Self::Bear => MarketScenario::synthetic("bear", 0.025, -0.005),
            Self::Sideways => MarketScenario::synthetic("sideways", 0.01, 0.0),
            Self::Volatile => MarketScenario::synthetic("volatile", 0.05, 0.0),
            Self::FlashCrash => MarketScenario::synthetic("flash_crash", 0.08, -0.02),
        }
    }
}

/// Source of scenarios consumed by the fitness evaluator.
pub trait ScenarioProvider: Send + Sync {
    fn scenarios(&self) -> Vec<MarketScenario>;
}

/// The five built-in presets.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresetScenarios;

impl ScenarioProvider for PresetScenarios {
    fn scenarios(&self) -> Vec<MarketScenario> {
        ScenarioPreset::ALL.iter().map(|p| p.scenario()).collect()
    }
}

/// A caller-supplied, fixed list of scenarios.
#[derive(Debug, Clone, Default)]
pub struct StaticScenarios(pub Vec<MarketScenario>);

impl ScenarioProvider for StaticScenarios {
    fn scenarios(&self) -> Vec<MarketScenario> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        let scenarios = PresetScenarios.scenarios();
        assert_eq!(scenarios.len(), 5);
        for s in &scenarios {
            assert!(s.validate().is_ok(), "{} should be valid", s.name);
            assert!(!s.is_historical());
        }
    }

    #[test]
    fn preset_names_are_unique() {
        let scenarios = PresetScenarios.scenarios();
        let mut names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn negative_volatility_is_invalid() {
        let s = MarketScenario::synthetic("broken", -0.1, 0.0);
        assert!(s.validate().is_err());
    }

    #[test]
    fn nan_trend_is_invalid() {
        let s = MarketScenario::synthetic("broken", 0.1, f64::NAN);
        assert!(s.validate().is_err());
    }

    #[test]
    fn from_prices_computes_moves() {
        let s = MarketScenario::from_prices("hist", &[100.0, 110.0, 99.0]).unwrap();
        let moves = s.moves.as_ref().unwrap();
        assert_eq!(moves.len(), 2);
        assert!((moves[0] - 0.1).abs() < 1e-12);
        assert!((moves[1] - (-0.1)).abs() < 1e-12);
        assert!(s.trend.abs() < 1e-12);
        assert!(s.volatility > 0.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn from_prices_rejects_short_series() {
        let err = MarketScenario::from_prices("hist", &[100.0]).unwrap_err();
        assert!(matches!(err, ScenarioError::TooFewPrices { got: 1, .. }));
    }

    #[test]
    fn from_prices_rejects_non_positive() {
        let err = MarketScenario::from_prices("hist", &[100.0, 0.0, 50.0]).unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidPrice { row: 1, .. }));
    }

    #[test]
    fn static_provider_returns_its_list() {
        let provider = StaticScenarios(vec![MarketScenario::synthetic("only", 0.01, 0.0)]);
        let scenarios = provider.scenarios();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, "only");
    }
}
