//! Population: one generation of genomes, ranking and selection.
//!
//! Ranking is by fitness score, highest first. Unscored genomes sort after
//! every scored one and ties break on genome id, so the order is total and
//! reproducible.

use std::cmp::Ordering;

use rand::Rng;
use serde::{Deserialize, Serialize};

use darwinfi_core::genome::{GeneChoice, GenomeError, NumericGene, StrategyGenome};

use crate::metrics::{mean_f64, median, std_dev};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    generation: u32,
    members: Vec<StrategyGenome>,
}

/// Fitness summary of the scored, usable members.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessStats {
    pub best: f64,
    pub worst: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// Members contributing to the statistics.
    pub scored: usize,
    /// Members whose evaluation failed.
    pub failed: usize,
}

/// How spread out a population is, in fitness and in gene space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiversityMetrics {
    pub fitness_std: f64,
    pub fitness_range: f64,
    pub fitness_mean: f64,
    pub fitness_median: f64,
    /// Mean over numeric genes of (std dev / range width). 0 = clones.
    pub gene_spread: f64,
    /// Distinct (entry, exit, risk, timeframe) combinations.
    pub distinct_layouts: usize,
}

/// Descending fitness, unscored last, then ascending id.
pub fn compare_rank(a: &StrategyGenome, b: &StrategyGenome) -> Ordering {
    let by_score = match (a.fitness_score(), b.fitness_score()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score.then_with(|| a.id().cmp(b.id()))
}

fn is_eligible(genome: &StrategyGenome) -> bool {
    genome.fitness().is_some_and(|r| r.is_usable())
}

impl Population {
    pub fn new(generation: u32, members: Vec<StrategyGenome>) -> Self {
        Self {
            generation,
            members,
        }
    }

    /// Generation-0 population of `size` random genomes.
    pub fn random<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        let members = (0..size)
            .map(|_| StrategyGenome::create_random(rng))
            .collect();
        Self::new(0, members)
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn members(&self) -> &[StrategyGenome] {
        &self.members
    }

    pub fn into_members(self) -> Vec<StrategyGenome> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn unscored_count(&self) -> usize {
        self.members.iter().filter(|g| !g.is_evaluated()).count()
    }

    pub fn is_fully_scored(&self) -> bool {
        self.unscored_count() == 0
    }

    /// Members in rank order.
    pub fn rank(&self) -> Vec<&StrategyGenome> {
        let mut ranked: Vec<&StrategyGenome> = self.members.iter().collect();
        ranked.sort_by(|a, b| compare_rank(a, b));
        ranked
    }

    /// Top `ceil(len × fraction)` members, unchanged.
    pub fn select_elites(&self, fraction: f64) -> Vec<StrategyGenome> {
        let count = ((self.len() as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize).min(self.len());
        self.rank().into_iter().take(count).cloned().collect()
    }

    /// Top `floor(len × rate)` members that hold a usable score.
    ///
    /// Failed or unscored genomes never become parents, even when they fall
    /// inside the cut.
    pub fn select_parents(&self, rate: f64) -> Vec<&StrategyGenome> {
        let count = ((self.len() as f64 * rate.clamp(0.0, 1.0)).floor() as usize).min(self.len());
        self.rank()
            .into_iter()
            .take(count)
            .filter(|g| is_eligible(g))
            .collect()
    }

    /// Highest-ranked scored member.
    pub fn best(&self) -> Option<&StrategyGenome> {
        self.members
            .iter()
            .filter(|g| g.is_evaluated())
            .min_by(|a, b| compare_rank(a, b))
    }

    /// Every member's genes lie within bounds.
    pub fn validate(&self) -> Result<(), GenomeError> {
        self.members.iter().try_for_each(|g| g.genes().validate())
    }

    fn usable_scores(&self) -> Vec<f64> {
        self.members
            .iter()
            .filter(|g| is_eligible(g))
            .filter_map(|g| g.fitness_score())
            .collect()
    }

    pub fn fitness_stats(&self) -> Option<FitnessStats> {
        let scores = self.usable_scores();
        if scores.is_empty() {
            return None;
        }
        let failed = self
            .members
            .iter()
            .filter(|g| g.fitness().is_some_and(|r| r.failed))
            .count();
        Some(FitnessStats {
            best: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            worst: scores.iter().copied().fold(f64::INFINITY, f64::min),
            mean: mean_f64(&scores),
            median: median(&scores),
            std_dev: std_dev(&scores),
            scored: scores.len(),
            failed,
        })
    }

    pub fn diversity(&self) -> DiversityMetrics {
        let scores = self.usable_scores();
        let fitness_range = if scores.is_empty() {
            0.0
        } else {
            let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
            max - min
        };

        let gene_spread = if self.members.len() < 2 {
            0.0
        } else {
            let per_gene: Vec<f64> = NumericGene::ALL
                .iter()
                .map(|&gene| {
                    let values: Vec<f64> = self.members.iter().map(|g| g.genes().get(gene)).collect();
                    std_dev(&values) / gene.bounds().width()
                })
                .collect();
            mean_f64(&per_gene)
        };

        let mut layouts: Vec<_> = self
            .members
            .iter()
            .map(|g| {
                let genes = g.genes();
                (
                    genes.entry_method.label(),
                    genes.exit_method.label(),
                    genes.risk_management.label(),
                    genes.timeframe.label(),
                )
            })
            .collect();
        layouts.sort_unstable();
        layouts.dedup();

        DiversityMetrics {
            fitness_std: std_dev(&scores),
            fitness_range,
            fitness_mean: mean_f64(&scores),
            fitness_median: median(&scores),
            gene_spread,
            distinct_layouts: layouts.len(),
        }
    }
}
