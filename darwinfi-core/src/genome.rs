//! Strategy genome: the tunable "DNA" of one trading strategy.
//!
//! A genome is four categorical genes (entry, exit, risk management, timeframe)
//! and six bounded numeric genes. [`Genes`] is the plain value type the genetic
//! operators work on; [`StrategyGenome`] wraps it with identity, lineage and an
//! optional fitness report, and is immutable once built.
//!
//! Every constructor either validates or clamps, so a `StrategyGenome` can
//! never hold an out-of-range gene.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{FitnessReport, GenomeId};
use crate::scenario::MarketCondition;

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenomeError {
    #[error("gene {gene} = {value} is outside [{min}, {max}]")]
    OutOfBounds {
        gene: NumericGene,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("genome lists {0} parents, at most 2 are allowed")]
    TooManyParents(usize),
}

// ─── Categorical genes ───────────────────────────────────────────────

/// Shared behavior of the enumerated genes.
///
/// `complexity` is a descriptive weight for reports. Fitness never reads it.
pub trait GeneChoice: Copy + PartialEq + 'static {
    const ALL: &'static [Self];

    fn label(&self) -> &'static str;

    fn complexity(&self) -> f64;

    /// Uniform draw over all variants.
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMethod {
    MarketOrder,
    LimitOrder,
    StopLimit,
    DollarCostAverage,
}

impl GeneChoice for EntryMethod {
    const ALL: &'static [Self] = &[
        Self::MarketOrder,
        Self::LimitOrder,
        Self::StopLimit,
        Self::DollarCostAverage,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::MarketOrder => "MarketOrder",
            Self::LimitOrder => "LimitOrder",
            Self::StopLimit => "StopLimit",
            Self::DollarCostAverage => "DCA",
        }
    }

    fn complexity(&self) -> f64 {
        match self {
            Self::MarketOrder => 1.0,
            Self::LimitOrder => 1.5,
            Self::StopLimit => 2.0,
            Self::DollarCostAverage => 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitMethod {
    MarketOrder,
    TakeProfitLimit,
    TrailingStop,
    TimeBased,
}

impl GeneChoice for ExitMethod {
    const ALL: &'static [Self] = &[
        Self::MarketOrder,
        Self::TakeProfitLimit,
        Self::TrailingStop,
        Self::TimeBased,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::MarketOrder => "MarketExit",
            Self::TakeProfitLimit => "TakeProfit",
            Self::TrailingStop => "TrailingStop",
            Self::TimeBased => "TimeBased",
        }
    }

    fn complexity(&self) -> f64 {
        match self {
            Self::MarketOrder => 1.0,
            Self::TakeProfitLimit => 1.5,
            Self::TrailingStop => 2.5,
            Self::TimeBased => 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskManagement {
    FixedPositionSize,
    PercentageRisk,
    KellyCriterion,
    DynamicPositionSizing,
}

impl GeneChoice for RiskManagement {
    const ALL: &'static [Self] = &[
        Self::FixedPositionSize,
        Self::PercentageRisk,
        Self::KellyCriterion,
        Self::DynamicPositionSizing,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::FixedPositionSize => "Fixed",
            Self::PercentageRisk => "PctRisk",
            Self::KellyCriterion => "Kelly",
            Self::DynamicPositionSizing => "Dynamic",
        }
    }

    fn complexity(&self) -> f64 {
        match self {
            Self::FixedPositionSize => 1.0,
            Self::PercentageRisk => 1.5,
            Self::KellyCriterion => 3.0,
            Self::DynamicPositionSizing => 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M15,
    H1,
    H4,
    D1,
}

impl GeneChoice for Timeframe {
    const ALL: &'static [Self] = &[Self::M15, Self::H1, Self::H4, Self::D1];

    fn label(&self) -> &'static str {
        match self {
            Self::M15 => "M15",
            Self::H1 => "H1",
            Self::H4 => "H4",
            Self::D1 => "D1",
        }
    }

    fn complexity(&self) -> f64 {
        match self {
            Self::M15 => 2.0,
            Self::H1 => 1.5,
            Self::H4 => 1.2,
            Self::D1 => 1.0,
        }
    }
}

/// Names the four categorical genes so operators can iterate over them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoricalGene {
    EntryMethod,
    ExitMethod,
    RiskManagement,
    Timeframe,
}

impl CategoricalGene {
    pub const ALL: [CategoricalGene; 4] = [
        CategoricalGene::EntryMethod,
        CategoricalGene::ExitMethod,
        CategoricalGene::RiskManagement,
        CategoricalGene::Timeframe,
    ];
}

// ─── Numeric genes ───────────────────────────────────────────────────

/// Inclusive range of a numeric gene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneBounds {
    pub min: f64,
    pub max: f64,
}

impl GeneBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Clamp into range. NaN collapses to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

/// Names the six numeric genes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericGene {
    EntryThreshold,
    ExitThreshold,
    StopLossPct,
    TakeProfitPct,
    Leverage,
    RebalanceHours,
}

impl NumericGene {
    pub const ALL: [NumericGene; 6] = [
        NumericGene::EntryThreshold,
        NumericGene::ExitThreshold,
        NumericGene::StopLossPct,
        NumericGene::TakeProfitPct,
        NumericGene::Leverage,
        NumericGene::RebalanceHours,
    ];

    pub const fn bounds(&self) -> GeneBounds {
        match self {
            Self::EntryThreshold => GeneBounds::new(0.01, 0.2),
            Self::ExitThreshold => GeneBounds::new(0.01, 0.2),
            Self::StopLossPct => GeneBounds::new(0.01, 0.2),
            Self::TakeProfitPct => GeneBounds::new(0.02, 0.4),
            Self::Leverage => GeneBounds::new(1.0, 10.0),
            Self::RebalanceHours => GeneBounds::new(1.0, 48.0),
        }
    }

    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Leverage | Self::RebalanceHours)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EntryThreshold => "entry_threshold",
            Self::ExitThreshold => "exit_threshold",
            Self::StopLossPct => "stop_loss_pct",
            Self::TakeProfitPct => "take_profit_pct",
            Self::Leverage => "leverage",
            Self::RebalanceHours => "rebalance_hours",
        }
    }
}

impl fmt::Display for NumericGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Genes ───────────────────────────────────────────────────────────

/// The full gene set of one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genes {
    pub entry_method: EntryMethod,
    pub exit_method: ExitMethod,
    pub risk_management: RiskManagement,
    pub timeframe: Timeframe,

    pub entry_threshold: f64,
    pub exit_threshold: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub leverage: u32,
    pub rebalance_hours: u32,
}

impl Genes {
    /// Draw every gene uniformly from its range or enumeration.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut draw = |gene: NumericGene| {
            let b = gene.bounds();
            rng.gen_range(b.min..=b.max)
        };
        let entry_threshold = draw(NumericGene::EntryThreshold);
        let exit_threshold = draw(NumericGene::ExitThreshold);
        let stop_loss_pct = draw(NumericGene::StopLossPct);
        let take_profit_pct = draw(NumericGene::TakeProfitPct);

        Self {
            entry_method: EntryMethod::random(rng),
            exit_method: ExitMethod::random(rng),
            risk_management: RiskManagement::random(rng),
            timeframe: Timeframe::random(rng),
            entry_threshold,
            exit_threshold,
            stop_loss_pct,
            take_profit_pct,
            leverage: rng.gen_range(1..=10),
            rebalance_hours: rng.gen_range(1..=48),
        }
    }

    /// Numeric gene value as `f64`.
    pub fn get(&self, gene: NumericGene) -> f64 {
        match gene {
            NumericGene::EntryThreshold => self.entry_threshold,
            NumericGene::ExitThreshold => self.exit_threshold,
            NumericGene::StopLossPct => self.stop_loss_pct,
            NumericGene::TakeProfitPct => self.take_profit_pct,
            NumericGene::Leverage => self.leverage as f64,
            NumericGene::RebalanceHours => self.rebalance_hours as f64,
        }
    }

    /// Set a numeric gene. The value is clamped, and rounded for integer genes.
    pub fn set(&mut self, gene: NumericGene, value: f64) {
        let v = gene.bounds().clamp(value);
        match gene {
            NumericGene::EntryThreshold => self.entry_threshold = v,
            NumericGene::ExitThreshold => self.exit_threshold = v,
            NumericGene::StopLossPct => self.stop_loss_pct = v,
            NumericGene::TakeProfitPct => self.take_profit_pct = v,
            NumericGene::Leverage => self.leverage = v.round() as u32,
            NumericGene::RebalanceHours => self.rebalance_hours = v.round() as u32,
        }
    }

    /// Copy `gene` from `other` into `self`.
    pub fn inherit_categorical(&mut self, gene: CategoricalGene, other: &Genes) {
        match gene {
            CategoricalGene::EntryMethod => self.entry_method = other.entry_method,
            CategoricalGene::ExitMethod => self.exit_method = other.exit_method,
            CategoricalGene::RiskManagement => self.risk_management = other.risk_management,
            CategoricalGene::Timeframe => self.timeframe = other.timeframe,
        }
    }

    /// Replace `gene` with a fresh uniform draw.
    pub fn redraw_categorical<R: Rng + ?Sized>(&mut self, gene: CategoricalGene, rng: &mut R) {
        match gene {
            CategoricalGene::EntryMethod => self.entry_method = EntryMethod::random(rng),
            CategoricalGene::ExitMethod => self.exit_method = ExitMethod::random(rng),
            CategoricalGene::RiskManagement => self.risk_management = RiskManagement::random(rng),
            CategoricalGene::Timeframe => self.timeframe = Timeframe::random(rng),
        }
    }

    /// Copy with every numeric gene clamped into its legal range.
    pub fn clamp_all(&self) -> Genes {
        let mut out = self.clone();
        for gene in NumericGene::ALL {
            out.set(gene, self.get(gene));
        }
        out
    }

    /// Reject the first out-of-range gene.
    pub fn validate(&self) -> Result<(), GenomeError> {
        for gene in NumericGene::ALL {
            let b = gene.bounds();
            let value = self.get(gene);
            if !b.contains(value) {
                return Err(GenomeError::OutOfBounds {
                    gene,
                    value,
                    min: b.min,
                    max: b.max,
                });
            }
        }
        Ok(())
    }

    /// Sum of the categorical complexity weights.
    pub fn complexity_score(&self) -> f64 {
        self.entry_method.complexity()
            + self.exit_method.complexity()
            + self.risk_management.complexity()
            + self.timeframe.complexity()
    }
}

// ─── StrategyGenome ──────────────────────────────────────────────────

/// One candidate strategy with identity, lineage and (once scored) fitness.
///
/// Fields are private: a genome never changes after construction. Operators
/// build new genomes; attaching a score goes through [`Self::with_fitness`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GenomeRecord")]
pub struct StrategyGenome {
    id: GenomeId,
    name: String,
    genes: Genes,
    generation: u32,
    parent_ids: Vec<GenomeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    specialization: Option<MarketCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fitness: Option<FitnessReport>,
}

impl StrategyGenome {
    /// Build a genome from explicit parts, validating every gene.
    pub fn new(
        id: GenomeId,
        genes: Genes,
        generation: u32,
        parent_ids: Vec<GenomeId>,
        specialization: Option<MarketCondition>,
    ) -> Result<Self, GenomeError> {
        genes.validate()?;
        if parent_ids.len() > 2 {
            return Err(GenomeError::TooManyParents(parent_ids.len()));
        }
        let name = generate_name(&id, &genes, generation, specialization);
        Ok(Self {
            id,
            name,
            genes,
            generation,
            parent_ids,
            specialization,
            fitness: None,
        })
    }

    /// A generation-0 genome with every gene drawn at random.
    pub fn create_random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id = GenomeId::random(rng);
        let genes = Genes::random(rng);
        let name = generate_name(&id, &genes, 0, None);
        Self {
            id,
            name,
            genes,
            generation: 0,
            parent_ids: Vec::new(),
            specialization: None,
            fitness: None,
        }
    }

    /// Offspring of one or two parents. Genes are clamped, generation is
    /// `max(parent generations) + 1`.
    pub fn from_parents<R: Rng + ?Sized>(
        rng: &mut R,
        genes: Genes,
        parents: &[&StrategyGenome],
        specialization: Option<MarketCondition>,
    ) -> Self {
        debug_assert!(
            (1..=2).contains(&parents.len()),
            "offspring need one or two parents"
        );
        let id = GenomeId::random(rng);
        let genes = genes.clamp_all();
        let generation = parents
            .iter()
            .map(|p| p.generation)
            .max()
            .unwrap_or(0)
            .saturating_add(1);
        let parent_ids = parents.iter().take(2).map(|p| p.id.clone()).collect();
        let name = generate_name(&id, &genes, generation, specialization);
        Self {
            id,
            name,
            genes,
            generation,
            parent_ids,
            specialization,
            fitness: None,
        }
    }

    /// Copy of this genome with every numeric gene clamped.
    pub fn clamp_all(&self) -> Self {
        Self {
            genes: self.genes.clamp_all(),
            ..self.clone()
        }
    }

    /// Same genome, now carrying a fitness report.
    pub fn with_fitness(self, report: FitnessReport) -> Self {
        Self {
            fitness: Some(report),
            ..self
        }
    }

    pub fn id(&self) -> &GenomeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn genes(&self) -> &Genes {
        &self.genes
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn parent_ids(&self) -> &[GenomeId] {
        &self.parent_ids
    }

    pub fn specialization(&self) -> Option<MarketCondition> {
        self.specialization
    }

    /// The fitness report, or `None` if not yet evaluated.
    pub fn fitness(&self) -> Option<&FitnessReport> {
        self.fitness.as_ref()
    }

    pub fn fitness_score(&self) -> Option<f64> {
        self.fitness.as_ref().map(|r| r.fitness_score)
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    pub fn complexity_score(&self) -> f64 {
        self.genes.complexity_score()
    }
}

impl fmt::Display for StrategyGenome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fitness_score() {
            Some(score) => write!(f, "{} (fitness {score:.4})", self.name),
            None => write!(f, "{} (unscored)", self.name),
        }
    }
}

fn generate_name(
    id: &GenomeId,
    genes: &Genes,
    generation: u32,
    specialization: Option<MarketCondition>,
) -> String {
    let base = format!(
        "{}/{}/{} g{}-{}",
        genes.entry_method.label(),
        genes.risk_management.label(),
        genes.timeframe.label(),
        generation,
        id.short()
    );
    match specialization {
        Some(condition) => format!("{base} [{condition}]"),
        None => base,
    }
}

/// Deserialization shadow of [`StrategyGenome`]; converted through validation.
#[derive(Deserialize)]
struct GenomeRecord {
    id: GenomeId,
    #[serde(default)]
    name: Option<String>,
    genes: Genes,
    generation: u32,
    #[serde(default)]
    parent_ids: Vec<GenomeId>,
    #[serde(default)]
    specialization: Option<MarketCondition>,
    #[serde(default)]
    fitness: Option<FitnessReport>,
}

impl TryFrom<GenomeRecord> for StrategyGenome {
    type Error = GenomeError;

    fn try_from(record: GenomeRecord) -> Result<Self, Self::Error> {
        let mut genome = StrategyGenome::new(
            record.id,
            record.genes,
            record.generation,
            record.parent_ids,
            record.specialization,
        )?;
        if let Some(name) = record.name {
            genome.name = name;
        }
        genome.fitness = record.fitness;
        Ok(genome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_genes() -> Genes {
        Genes {
            entry_method: EntryMethod::LimitOrder,
            exit_method: ExitMethod::TrailingStop,
            risk_management: RiskManagement::KellyCriterion,
            timeframe: Timeframe::H4,
            entry_threshold: 0.05,
            exit_threshold: 0.1,
            stop_loss_pct: 0.03,
            take_profit_pct: 0.1,
            leverage: 2,
            rebalance_hours: 12,
        }
    }

    #[test]
    fn random_genome_is_generation_zero_without_parents() {
        let mut rng = StdRng::seed_from_u64(42);
        let g = StrategyGenome::create_random(&mut rng);
        assert_eq!(g.generation(), 0);
        assert!(g.parent_ids().is_empty());
        assert!(g.fitness().is_none());
        assert!(g.genes().validate().is_ok());
    }

    #[test]
    fn random_genome_is_reproducible() {
        let mut r1 = StdRng::seed_from_u64(9);
        let mut r2 = StdRng::seed_from_u64(9);
        assert_eq!(
            StrategyGenome::create_random(&mut r1),
            StrategyGenome::create_random(&mut r2)
        );
    }

    #[test]
    fn new_rejects_out_of_bounds() {
        let mut genes = sample_genes();
        genes.stop_loss_pct = 0.5;
        let err = StrategyGenome::new(GenomeId::new("x"), genes, 0, vec![], None).unwrap_err();
        assert!(matches!(
            err,
            GenomeError::OutOfBounds {
                gene: NumericGene::StopLossPct,
                ..
            }
        ));
    }

    #[test]
    fn new_rejects_zero_leverage() {
        let mut genes = sample_genes();
        genes.leverage = 0;
        assert!(StrategyGenome::new(GenomeId::new("x"), genes, 0, vec![], None).is_err());
    }

    #[test]
    fn new_rejects_three_parents() {
        let parents = vec![GenomeId::new("a"), GenomeId::new("b"), GenomeId::new("c")];
        let err =
            StrategyGenome::new(GenomeId::new("x"), sample_genes(), 1, parents, None).unwrap_err();
        assert_eq!(err, GenomeError::TooManyParents(3));
    }

    #[test]
    fn clamp_all_pulls_genes_into_range() {
        let mut genes = sample_genes();
        genes.entry_threshold = -3.0;
        genes.take_profit_pct = 9.0;
        genes.exit_threshold = f64::NAN;
        genes.rebalance_hours = 500;
        let clamped = genes.clamp_all();
        assert_eq!(clamped.entry_threshold, 0.01);
        assert_eq!(clamped.take_profit_pct, 0.4);
        assert_eq!(clamped.exit_threshold, 0.01);
        assert_eq!(clamped.rebalance_hours, 48);
        assert!(clamped.validate().is_ok());
    }

    #[test]
    fn set_rounds_integer_genes() {
        let mut genes = sample_genes();
        genes.set(NumericGene::Leverage, 3.6);
        assert_eq!(genes.leverage, 4);
        genes.set(NumericGene::RebalanceHours, -7.0);
        assert_eq!(genes.rebalance_hours, 1);
    }

    #[test]
    fn from_parents_sets_lineage() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = StrategyGenome::create_random(&mut rng);
        let b = StrategyGenome::from_parents(&mut rng, a.genes().clone(), &[&a], None);
        let c = StrategyGenome::from_parents(&mut rng, sample_genes(), &[&a, &b], None);

        assert_eq!(b.generation(), 1);
        assert_eq!(b.parent_ids(), &[a.id().clone()]);
        assert_eq!(c.generation(), 2);
        assert_eq!(c.parent_ids(), &[a.id().clone(), b.id().clone()]);
        assert_ne!(c.id(), a.id());
    }

    #[test]
    fn with_fitness_keeps_identity() {
        let mut rng = StdRng::seed_from_u64(3);
        let g = StrategyGenome::create_random(&mut rng);
        let id = g.id().clone();
        let scored = g.with_fitness(FitnessReport::failed("n/a"));
        assert_eq!(scored.id(), &id);
        assert!(scored.is_evaluated());
    }

    #[test]
    fn name_mentions_specialization() {
        let g = StrategyGenome::new(
            GenomeId::new("deadbeefcafe"),
            sample_genes(),
            2,
            vec![GenomeId::new("p")],
            Some(MarketCondition::Bear),
        )
        .unwrap();
        assert_eq!(g.name(), "LimitOrder/Kelly/H4 g2-deadbeef [bear]");
    }

    #[test]
    fn deserialization_validates_genes() {
        let mut rng = StdRng::seed_from_u64(5);
        let g = StrategyGenome::create_random(&mut rng);
        let mut value = serde_json::to_value(&g).unwrap();
        value["genes"]["leverage"] = serde_json::json!(99);
        let result: Result<StrategyGenome, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn serialization_round_trip_preserves_genome() {
        let mut rng = StdRng::seed_from_u64(6);
        let g = StrategyGenome::create_random(&mut rng);
        let json = serde_json::to_string(&g).unwrap();
        let back: StrategyGenome = serde_json::from_str(&json).unwrap();
        assert_eq!(g, back);
    }

    #[test]
    fn complexity_score_sums_weights() {
        let genes = sample_genes();
        let expected = 1.5 + 2.5 + 3.0 + 1.2;
        assert!((genes.complexity_score() - expected).abs() < 1e-12);
    }
}
