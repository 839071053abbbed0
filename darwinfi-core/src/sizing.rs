//! Position sizing: turns capital and the risk-management gene into a notional.
//!
//! Shared by the fitness simulator and the entry/exit instruction builder so
//! that the size a strategy is scored with is the size it would trade.

use crate::genome::{Genes, RiskManagement};

/// Fraction of capital committed by `FixedPositionSize`.
pub const FIXED_FRACTION: f64 = 0.10;

/// Simplified Kelly fraction, clamped to `[0, 1]`.
///
/// Win probability is implied as `0.5 + entry_threshold`; the payoff ratio is
/// `take_profit / stop_loss`.
pub fn kelly_fraction(genes: &Genes) -> f64 {
    let p = 0.5 + genes.entry_threshold;
    let q = 1.0 - p;
    let b = genes.take_profit_pct / genes.stop_loss_pct;
    if !b.is_finite() || b <= 0.0 {
        return 0.0;
    }
    ((b * p - q) / b).clamp(0.0, 1.0)
}

/// Notional size before leverage.
///
/// `price_move` is only read by `DynamicPositionSizing`.
pub fn base_size(genes: &Genes, capital: f64, price_move: f64) -> f64 {
    if capital <= 0.0 {
        return 0.0;
    }
    match genes.risk_management {
        RiskManagement::FixedPositionSize => capital * FIXED_FRACTION,
        RiskManagement::PercentageRisk => capital * genes.stop_loss_pct,
        RiskManagement::KellyCriterion => capital * kelly_fraction(genes),
        RiskManagement::DynamicPositionSizing => capital * (0.1 + 0.2 * price_move.abs()),
    }
}

/// Leveraged notional size.
pub fn position_size(genes: &Genes, capital: f64, price_move: f64) -> f64 {
    base_size(genes, capital, price_move) * genes.leverage as f64
}
