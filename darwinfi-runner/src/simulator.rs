//! Scenario simulator: replays one genome against one market scenario.
//!
//! Each period draws (or replays) a price move, then an entry signal, and if
//! a trade is entered, an exit signal. The draw order is fixed so that a
//! given RNG state always yields the same run.

use rand::Rng;
use thiserror::Error;

use darwinfi_core::domain::ScenarioMetrics;
use darwinfi_core::genome::{Genes, GenomeError};
use darwinfi_core::scenario::MarketScenario;
use darwinfi_core::sizing::position_size;

use crate::config::SimulationConfig;
use crate::metrics;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("invalid genome: {0}")]
    InvalidGenome(#[from] GenomeError),

    #[error("no scenarios to evaluate")]
    NoScenarios,

    #[error("non-finite {metric} in scenario '{scenario}'")]
    NonFinite {
        scenario: String,
        metric: &'static str,
    },
}

/// How a single trade closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeExit {
    TakeProfit,
    StopLoss,
    Market,
}

/// Resolve one period's trade into `(pnl, exit)`.
///
/// Take-profit wins over stop-loss when the exit signal fires on a losing move.
pub fn resolve_trade(genes: &Genes, size: f64, price_move: f64, exit_signal: f64) -> (f64, TradeExit) {
    if price_move > genes.take_profit_pct || exit_signal > genes.exit_threshold {
        (size * genes.take_profit_pct, TradeExit::TakeProfit)
    } else if price_move < -genes.stop_loss_pct {
        (-size * genes.stop_loss_pct, TradeExit::StopLoss)
    } else {
        (size * price_move, TradeExit::Market)
    }
}

/// Simulate `genes` on `scenario` and summarize the run.
pub fn simulate_scenario<R: Rng + ?Sized>(
    genes: &Genes,
    scenario: &MarketScenario,
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<ScenarioMetrics, SimulationError> {
    scenario.validate().map_err(SimulationError::InvalidScenario)?;
    genes.validate()?;

    let periods = match &scenario.moves {
        Some(moves) => config.periods.min(moves.len()),
        None => config.periods,
    };

    let mut capital = config.initial_capital;
    let mut capital_curve = Vec::with_capacity(periods + 1);
    capital_curve.push(capital);
    let mut period_returns = Vec::with_capacity(periods);
    let mut trades = 0usize;
    let mut wins = 0usize;

    for period in 0..periods {
        let price_move = match &scenario.moves {
            Some(moves) => moves[period],
            None => scenario.trend + scenario.volatility * (2.0 * rng.gen::<f64>() - 1.0),
        };
        let entry_signal: f64 = rng.gen();

        if entry_signal > genes.entry_threshold && capital > 0.0 {
            let size = position_size(genes, capital, price_move);
            let exit_signal: f64 = rng.gen();
            let (pnl, exit) = resolve_trade(genes, size, price_move, exit_signal);

            trades += 1;
            let won = match exit {
                TradeExit::TakeProfit => true,
                TradeExit::StopLoss => false,
                TradeExit::Market => pnl > 0.0,
            };
            if won {
                wins += 1;
            }

            period_returns.push(pnl / capital);
            capital += pnl;
        } else {
            period_returns.push(0.0);
        }
        capital_curve.push(capital);
    }

    Ok(ScenarioMetrics {
        scenario: scenario.name.clone(),
        total_return: metrics::total_return(&capital_curve),
        sharpe_ratio: metrics::sharpe_ratio(&period_returns),
        max_drawdown: metrics::max_drawdown(&capital_curve),
        win_rate: metrics::win_rate(wins, trades),
        volatility: metrics::volatility(&period_returns),
        trade_count: trades,
        final_capital: capital,
    })
}
