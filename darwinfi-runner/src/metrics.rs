//! Performance metrics: pure functions that compute run statistics.
//!
//! Every metric is a pure function: capital curve or per-period returns in,
//! scalar out. No dependencies on the simulator or the evolution loop.

/// Trading periods per year used to annualise the Sharpe ratio.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(capital_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&last)) = (capital_curve.first(), capital_curve.last()) else {
        return 0.0;
    };
    if capital_curve.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    (last - initial) / initial
}

/// Annualized Sharpe-like ratio from per-period returns.
///
/// Sharpe = mean(returns) / std(returns) * sqrt(252).
/// Returns 0.0 if the deviation is zero or there are fewer than 2 periods.
pub fn sharpe_ratio(period_returns: &[f64]) -> f64 {
    if period_returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(period_returns);
    let std = std_dev(period_returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * PERIODS_PER_YEAR.sqrt()
}

/// Maximum peak-to-trough drawdown as a positive fraction (0.15 = 15%).
///
/// Capital is allowed to go negative, in which case drawdown exceeds 1.0.
/// Returns 0.0 for a flat or monotonically rising curve.
pub fn max_drawdown(capital_curve: &[f64]) -> f64 {
    let Some(&first) = capital_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &capital in capital_curve {
        if capital > peak {
            peak = capital;
        }
        if peak > 0.0 {
            let dd = (peak - capital) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Win rate: wins / trades, 0.0 when no trades were taken.
pub fn win_rate(wins: usize, trades: usize) -> f64 {
    if trades == 0 {
        return 0.0;
    }
    wins as f64 / trades as f64
}

/// Per-period volatility: sample standard deviation of returns.
pub fn volatility(period_returns: &[f64]) -> f64 {
    std_dev(period_returns)
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Median of a slice; 0.0 when empty. NaNs sort last.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Total return ──

    #[test]
    fn total_return_positive() {
        let curve = vec![10_000.0, 10_500.0, 11_000.0];
        assert!((total_return(&curve) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn total_return_negative_capital() {
        let curve = vec![10_000.0, -5_000.0];
        assert!((total_return(&curve) - (-1.5)).abs() < 1e-10);
    }

    #[test]
    fn total_return_single_point() {
        assert_eq!(total_return(&[10_000.0]), 0.0);
    }

    #[test]
    fn total_return_empty() {
        assert_eq!(total_return(&[]), 0.0);
    }

    // ── Sharpe ──

    #[test]
    fn sharpe_zero_for_constant_returns() {
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01]), 0.0);
    }

    #[test]
    fn sharpe_zero_for_no_trades() {
        assert_eq!(sharpe_ratio(&[0.0; 30]), 0.0);
    }

    #[test]
    fn sharpe_matches_formula() {
        let r = [0.01, -0.02, 0.03, 0.0];
        let mean = 0.005;
        let var = ((0.005f64).powi(2) + (0.025f64).powi(2) + (0.025f64).powi(2) + (0.005f64).powi(2)) / 3.0;
        let expected = mean / var.sqrt() * 252.0_f64.sqrt();
        assert!((sharpe_ratio(&r) - expected).abs() < 1e-9);
    }

    #[test]
    fn sharpe_single_period() {
        assert_eq!(sharpe_ratio(&[0.05]), 0.0);
    }

    // ── Drawdown ──

    #[test]
    fn drawdown_basic() {
        let curve = vec![100.0, 120.0, 90.0, 130.0];
        assert!((max_drawdown(&curve) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn drawdown_monotonic_rise_is_zero() {
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn drawdown_past_zero_exceeds_one() {
        let curve = vec![100.0, -50.0];
        assert!((max_drawdown(&curve) - 1.5).abs() < 1e-12);
    }

    // ── Win rate ──

    #[test]
    fn win_rate_no_trades_is_zero() {
        assert_eq!(win_rate(0, 0), 0.0);
    }

    #[test]
    fn win_rate_basic() {
        assert!((win_rate(3, 4) - 0.75).abs() < 1e-12);
    }

    // ── Helpers ──

    #[test]
    fn std_dev_sample() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // sample variance = 32 / 7
        assert!((std_dev(&v) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }
}
