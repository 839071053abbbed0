//! Trade instructions: the abstract entry/exit orders a genome implies.
//!
//! The engine never talks to an exchange. An execution collaborator takes a
//! [`TradeInstruction`] and submits it however it likes.

use serde::{Deserialize, Serialize};

use crate::genome::{EntryMethod, ExitMethod, StrategyGenome};
use crate::sizing::position_size;

/// Number of tranches a dollar-cost-average entry is split into.
pub const DCA_TRANCHES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

/// Market state the instruction is built against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub market_id: String,
    pub capital: f64,
    pub last_price: f64,
    /// Most recent per-period move, used by dynamic sizing.
    #[serde(default)]
    pub recent_move: f64,
    /// Fill price of the open position, for exits. Falls back to `last_price`.
    #[serde(default)]
    pub entry_price: Option<f64>,
}

/// One order an execution collaborator would submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeInstruction {
    pub market_id: String,
    pub direction: Direction,
    /// Notional size in quote currency (per tranche for DCA).
    pub size: f64,
    /// Limit/stop price; `None` means a market order.
    pub price: Option<f64>,
    #[serde(default = "one")]
    pub tranches: u32,
}

fn one() -> u32 {
    1
}

/// Entry order implied by a genome.
pub fn entry_parameters(genome: &StrategyGenome, market: &MarketContext) -> TradeInstruction {
    let genes = genome.genes();
    let size = position_size(genes, market.capital, market.recent_move);

    let (price, tranches) = match genes.entry_method {
        EntryMethod::MarketOrder => (None, 1),
        EntryMethod::LimitOrder => (Some(market.last_price * (1.0 - genes.entry_threshold)), 1),
        EntryMethod::StopLimit => (Some(market.last_price * (1.0 + genes.entry_threshold)), 1),
        EntryMethod::DollarCostAverage => (None, DCA_TRANCHES),
    };

    TradeInstruction {
        market_id: market.market_id.clone(),
        direction: Direction::Buy,
        size: size / tranches as f64,
        price,
        tranches,
    }
}

/// Exit order implied by a genome for a position opened at `entry_price`.
pub fn exit_parameters(genome: &StrategyGenome, market: &MarketContext) -> TradeInstruction {
    let genes = genome.genes();
    let size = position_size(genes, market.capital, market.recent_move);
    let entry = market.entry_price.unwrap_or(market.last_price);

    let price = match genes.exit_method {
        ExitMethod::MarketOrder | ExitMethod::TimeBased => None,
        ExitMethod::TakeProfitLimit => Some(entry * (1.0 + genes.take_profit_pct)),
        ExitMethod::TrailingStop => Some(market.last_price * (1.0 - genes.stop_loss_pct)),
    };

    TradeInstruction {
        market_id: market.market_id.clone(),
        direction: Direction::Sell,
        size,
        price,
        tranches: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GenomeId;
    use crate::genome::{Genes, RiskManagement, Timeframe};

    fn genome(entry: EntryMethod, exit: ExitMethod) -> StrategyGenome {
        let genes = Genes {
            entry_method: entry,
            exit_method: exit,
            risk_management: RiskManagement::FixedPositionSize,
            timeframe: Timeframe::D1,
            entry_threshold: 0.02,
            exit_threshold: 0.05,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.1,
            leverage: 2,
            rebalance_hours: 24,
        };
        StrategyGenome::new(GenomeId::new("g"), genes, 0, vec![], None).unwrap()
    }

    fn market() -> MarketContext {
        MarketContext {
            market_id: "ETH-USD".into(),
            capital: 10_000.0,
            last_price: 100.0,
            recent_move: 0.0,
            entry_price: Some(90.0),
        }
    }

    #[test]
    fn market_entry_has_no_price() {
        let i = entry_parameters(&genome(EntryMethod::MarketOrder, ExitMethod::MarketOrder), &market());
        assert_eq!(i.direction, Direction::Buy);
        assert_eq!(i.price, None);
        assert!((i.size - 2_000.0).abs() < 1e-9);
        assert_eq!(i.market_id, "ETH-USD");
    }

    #[test]
    fn limit_entry_below_last() {
        let i = entry_parameters(&genome(EntryMethod::LimitOrder, ExitMethod::MarketOrder), &market());
        assert!((i.price.unwrap() - 98.0).abs() < 1e-9);
    }

    #[test]
    fn stop_limit_entry_above_last() {
        let i = entry_parameters(&genome(EntryMethod::StopLimit, ExitMethod::MarketOrder), &market());
        assert!((i.price.unwrap() - 102.0).abs() < 1e-9);
    }

    #[test]
    fn dca_splits_size() {
        let i = entry_parameters(
            &genome(EntryMethod::DollarCostAverage, ExitMethod::MarketOrder),
            &market(),
        );
        assert_eq!(i.tranches, DCA_TRANCHES);
        assert!((i.size * i.tranches as f64 - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn take_profit_exit_from_entry_price() {
        let i = exit_parameters(&genome(EntryMethod::MarketOrder, ExitMethod::TakeProfitLimit), &market());
        assert_eq!(i.direction, Direction::Sell);
        assert!((i.price.unwrap() - 99.0).abs() < 1e-9);
    }

    #[test]
    fn trailing_stop_exit_below_last() {
        let i = exit_parameters(&genome(EntryMethod::MarketOrder, ExitMethod::TrailingStop), &market());
        assert!((i.price.unwrap() - 95.0).abs() < 1e-9);
    }

    #[test]
    fn time_based_exit_is_market() {
        let i = exit_parameters(&genome(EntryMethod::MarketOrder, ExitMethod::TimeBased), &market());
        assert_eq!(i.price, None);
    }
}
