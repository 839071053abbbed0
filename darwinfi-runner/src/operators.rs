//! Genetic operators: crossover, mutation and market specialization.
//!
//! Every operator is a pure function of its inputs and the RNG it is handed.
//! Offspring are always clamped into gene bounds, get a fresh id, and record
//! their parents.

use rand::Rng;
use serde::{Deserialize, Serialize};

use darwinfi_core::genome::{
    CategoricalGene, EntryMethod, ExitMethod, Genes, NumericGene, RiskManagement, StrategyGenome,
    Timeframe,
};
use darwinfi_core::scenario::MarketCondition;

// ─── Crossover ───────────────────────────────────────────────────────

/// How one numeric gene is combined during crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneCrossover {
    /// Arithmetic mean of both parents (rounded for integer genes).
    Average,
    /// Coin flip for one parent's value.
    Inherit,
    /// Coin flip between `Average` and `Inherit`.
    Either,
}

/// Per-gene crossover policy for the numeric genes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrossoverPolicy {
    pub entry_threshold: GeneCrossover,
    pub exit_threshold: GeneCrossover,
    pub stop_loss_pct: GeneCrossover,
    pub take_profit_pct: GeneCrossover,
    pub leverage: GeneCrossover,
    pub rebalance_hours: GeneCrossover,
}

impl Default for CrossoverPolicy {
    fn default() -> Self {
        Self {
            entry_threshold: GeneCrossover::Average,
            exit_threshold: GeneCrossover::Average,
            stop_loss_pct: GeneCrossover::Average,
            take_profit_pct: GeneCrossover::Average,
            leverage: GeneCrossover::Inherit,
            rebalance_hours: GeneCrossover::Inherit,
        }
    }
}

impl CrossoverPolicy {
    /// The same rule for every gene.
    pub fn uniform(rule: GeneCrossover) -> Self {
        Self {
            entry_threshold: rule,
            exit_threshold: rule,
            stop_loss_pct: rule,
            take_profit_pct: rule,
            leverage: rule,
            rebalance_hours: rule,
        }
    }

    pub fn for_gene(&self, gene: NumericGene) -> GeneCrossover {
        match gene {
            NumericGene::EntryThreshold => self.entry_threshold,
            NumericGene::ExitThreshold => self.exit_threshold,
            NumericGene::StopLossPct => self.stop_loss_pct,
            NumericGene::TakeProfitPct => self.take_profit_pct,
            NumericGene::Leverage => self.leverage,
            NumericGene::RebalanceHours => self.rebalance_hours,
        }
    }
}

/// Combine two parents into one child.
///
/// Categorical genes are picked from either parent with equal probability;
/// numeric genes follow `policy`.
pub fn crossover<R: Rng + ?Sized>(
    a: &StrategyGenome,
    b: &StrategyGenome,
    policy: &CrossoverPolicy,
    rng: &mut R,
) -> StrategyGenome {
    let (ga, gb) = (a.genes(), b.genes());
    let mut genes = ga.clone();

    for gene in CategoricalGene::ALL {
        if rng.gen_bool(0.5) {
            genes.inherit_categorical(gene, gb);
        }
    }

    for gene in NumericGene::ALL {
        let (va, vb) = (ga.get(gene), gb.get(gene));
        let mean = (va + vb) / 2.0;
        let value = match policy.for_gene(gene) {
            GeneCrossover::Average => mean,
            GeneCrossover::Inherit => pick(rng, va, vb),
            GeneCrossover::Either => {
                if rng.gen_bool(0.5) {
                    mean
                } else {
                    pick(rng, va, vb)
                }
            }
        };
        genes.set(gene, value);
    }

    StrategyGenome::from_parents(rng, genes, &[a, b], None)
}

fn pick<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    if rng.gen_bool(0.5) {
        a
    } else {
        b
    }
}

// ─── Mutation ────────────────────────────────────────────────────────

/// Perturb a copy of `parent`.
///
/// Each gene mutates independently with probability `rate`. Categorical genes
/// are redrawn; numeric genes move by `U(-magnitude, +magnitude) × range width`.
/// The child keeps the parent's specialization tag.
pub fn mutate<R: Rng + ?Sized>(
    parent: &StrategyGenome,
    rate: f64,
    magnitude: f64,
    rng: &mut R,
) -> StrategyGenome {
    let mut genes = parent.genes().clone();
    perturb(&mut genes, rate, magnitude, &GeneOverrides::default(), rng);
    StrategyGenome::from_parents(rng, genes, &[parent], parent.specialization())
}

/// Mutate every gene not pinned by `pinned`.
fn perturb<R: Rng + ?Sized>(
    genes: &mut Genes,
    rate: f64,
    magnitude: f64,
    pinned: &GeneOverrides,
    rng: &mut R,
) {
    let rate = probability(rate);
    let magnitude = if magnitude.is_finite() { magnitude.abs() } else { 0.0 };

    for gene in CategoricalGene::ALL {
        if !pinned.pins_categorical(gene) && rng.gen_bool(rate) {
            genes.redraw_categorical(gene, rng);
        }
    }
    for gene in NumericGene::ALL {
        if !pinned.pins_numeric(gene) && rng.gen_bool(rate) {
            let delta = rng.gen_range(-magnitude..=magnitude) * gene.bounds().width();
            genes.set(gene, genes.get(gene) + delta);
        }
    }
}

fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

// ─── Specialization ──────────────────────────────────────────────────

/// Gene values forced onto a specialized child. `None` leaves the gene free.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneOverrides {
    pub entry_method: Option<EntryMethod>,
    pub exit_method: Option<ExitMethod>,
    pub risk_management: Option<RiskManagement>,
    pub timeframe: Option<Timeframe>,
    pub entry_threshold: Option<f64>,
    pub exit_threshold: Option<f64>,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub leverage: Option<u32>,
    pub rebalance_hours: Option<u32>,
}

impl GeneOverrides {
    /// Built-in bias for each market condition.
    pub fn for_condition(condition: MarketCondition) -> Self {
        match condition {
            MarketCondition::Bull => Self {
                exit_method: Some(ExitMethod::TrailingStop),
                risk_management: Some(RiskManagement::KellyCriterion),
                take_profit_pct: Some(0.15),
                leverage: Some(3),
                ..Self::default()
            },
            MarketCondition::Bear => Self {
                entry_method: Some(EntryMethod::LimitOrder),
                risk_management: Some(RiskManagement::PercentageRisk),
                stop_loss_pct: Some(0.03),
                leverage: Some(1),
                ..Self::default()
            },
            MarketCondition::Sideways => Self {
                entry_method: Some(EntryMethod::LimitOrder),
                exit_method: Some(ExitMethod::TakeProfitLimit),
                entry_threshold: Some(0.05),
                take_profit_pct: Some(0.04),
                ..Self::default()
            },
            MarketCondition::Volatile => Self {
                risk_management: Some(RiskManagement::DynamicPositionSizing),
                timeframe: Some(Timeframe::H1),
                stop_loss_pct: Some(0.08),
                rebalance_hours: Some(4),
                ..Self::default()
            },
        }
    }

    /// `self` with every gene `other` sets replaced by `other`'s value.
    pub fn merged_with(&self, other: &GeneOverrides) -> Self {
        Self {
            entry_method: other.entry_method.or(self.entry_method),
            exit_method: other.exit_method.or(self.exit_method),
            risk_management: other.risk_management.or(self.risk_management),
            timeframe: other.timeframe.or(self.timeframe),
            entry_threshold: other.entry_threshold.or(self.entry_threshold),
            exit_threshold: other.exit_threshold.or(self.exit_threshold),
            stop_loss_pct: other.stop_loss_pct.or(self.stop_loss_pct),
            take_profit_pct: other.take_profit_pct.or(self.take_profit_pct),
            leverage: other.leverage.or(self.leverage),
            rebalance_hours: other.rebalance_hours.or(self.rebalance_hours),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn numeric(&self, gene: NumericGene) -> Option<f64> {
        match gene {
            NumericGene::EntryThreshold => self.entry_threshold,
            NumericGene::ExitThreshold => self.exit_threshold,
            NumericGene::StopLossPct => self.stop_loss_pct,
            NumericGene::TakeProfitPct => self.take_profit_pct,
            NumericGene::Leverage => self.leverage.map(f64::from),
            NumericGene::RebalanceHours => self.rebalance_hours.map(f64::from),
        }
    }

    pub fn pins_numeric(&self, gene: NumericGene) -> bool {
        self.numeric(gene).is_some()
    }

    pub fn pins_categorical(&self, gene: CategoricalGene) -> bool {
        match gene {
            CategoricalGene::EntryMethod => self.entry_method.is_some(),
            CategoricalGene::ExitMethod => self.exit_method.is_some(),
            CategoricalGene::RiskManagement => self.risk_management.is_some(),
            CategoricalGene::Timeframe => self.timeframe.is_some(),
        }
    }

    /// Write every set override into `genes`. Numeric values are clamped.
    pub fn apply(&self, genes: &mut Genes) {
        if let Some(v) = self.entry_method {
            genes.entry_method = v;
        }
        if let Some(v) = self.exit_method {
            genes.exit_method = v;
        }
        if let Some(v) = self.risk_management {
            genes.risk_management = v;
        }
        if let Some(v) = self.timeframe {
            genes.timeframe = v;
        }
        for gene in NumericGene::ALL {
            if let Some(v) = self.numeric(gene) {
                genes.set(gene, v);
            }
        }
    }

    /// Reject overrides that fall outside gene bounds.
    pub fn validate(&self) -> Result<(), String> {
        for gene in NumericGene::ALL {
            if let Some(v) = self.numeric(gene) {
                let b = gene.bounds();
                if !b.contains(v) {
                    return Err(format!(
                        "override {gene} = {v} is outside [{}, {}]",
                        b.min, b.max
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Bias a copy of `parent` toward `condition`.
///
/// The condition's preset overrides are merged with `overrides` (caller wins)
/// and applied; the remaining genes get a mutation at half `magnitude`. The
/// child is tagged with `condition`.
pub fn specialize<R: Rng + ?Sized>(
    parent: &StrategyGenome,
    condition: MarketCondition,
    overrides: &GeneOverrides,
    rate: f64,
    magnitude: f64,
    rng: &mut R,
) -> StrategyGenome {
    let pinned = GeneOverrides::for_condition(condition).merged_with(overrides);
    let mut genes = parent.genes().clone();
    pinned.apply(&mut genes);
    perturb(&mut genes, rate, magnitude / 2.0, &pinned, rng);
    StrategyGenome::from_parents(rng, genes, &[parent], Some(condition))
}
