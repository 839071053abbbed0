//! Evolution history: per-generation statistics and best-ever tracking.
//!
//! Stats can be persisted as JSONL, one generation per line, so long runs
//! can be inspected or plotted while they are still going.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use darwinfi_core::domain::GenomeId;
use darwinfi_core::genome::StrategyGenome;

use crate::population::Population;

/// Snapshot of one scored generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u32,
    pub best_fitness: f64,
    pub average_fitness: f64,
    pub worst_fitness: f64,
    pub population_size: usize,
    pub failed_count: usize,
    /// Fitness standard deviation across usable members.
    pub diversity: f64,
    pub gene_spread: f64,
    pub best_genome: Option<GenomeId>,
    pub elapsed_secs: f64,
    pub timestamp: NaiveDateTime,
}

impl GenerationStats {
    pub fn from_population(population: &Population, elapsed_secs: f64) -> Self {
        let diversity = population.diversity();
        let stats = population.fitness_stats();
        Self {
            generation: population.generation(),
            best_fitness: stats.map_or(0.0, |s| s.best),
            average_fitness: stats.map_or(0.0, |s| s.mean),
            worst_fitness: stats.map_or(0.0, |s| s.worst),
            population_size: population.len(),
            failed_count: stats.map_or(0, |s| s.failed),
            diversity: diversity.fitness_std,
            gene_spread: diversity.gene_spread,
            best_genome: population.best().map(|g| g.id().clone()),
            elapsed_secs,
            timestamp: chrono::Utc::now().naive_utc(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionHistory {
    generations: Vec<GenerationStats>,
    best_ever: Option<StrategyGenome>,
}

impl EvolutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a scored population and update the best-ever genome.
    pub fn record(&mut self, population: &Population, elapsed_secs: f64) -> &GenerationStats {
        if let Some(best) = population.best().filter(|g| g.fitness().is_some_and(|r| r.is_usable())) {
            let improves = match self.best_ever.as_ref().and_then(|g| g.fitness_score()) {
                Some(prev) => best.fitness_score().is_some_and(|s| s > prev),
                None => true,
            };
            if improves {
                self.best_ever = Some(best.clone());
            }
        }
        self.generations
            .push(GenerationStats::from_population(population, elapsed_secs));
        &self.generations[self.generations.len() - 1]
    }

    pub fn generations(&self) -> &[GenerationStats] {
        &self.generations
    }

    pub fn latest(&self) -> Option<&GenerationStats> {
        self.generations.last()
    }

    pub fn best_ever(&self) -> Option<&StrategyGenome> {
        self.best_ever.as_ref()
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Best fitness of the latest generation minus that of the first.
    pub fn improvement(&self) -> f64 {
        match (self.generations.first(), self.generations.last()) {
            (Some(first), Some(last)) => last.best_fitness - first.best_fitness,
            _ => 0.0,
        }
    }

    /// Generations recorded since the best fitness last strictly improved.
    pub fn stagnation(&self) -> usize {
        let mut best = f64::NEG_INFINITY;
        let mut since = 0;
        for stats in &self.generations {
            if stats.best_fitness > best {
                best = stats.best_fitness;
                since = 0;
            } else {
                since += 1;
            }
        }
        since
    }

    /// Append every generation as one JSON line. Creates parent directories.
    pub fn write_jsonl(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for stats in &self.generations {
            let json = serde_json::to_string(stats)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(file, "{json}")?;
        }
        file.flush()
    }

    /// Read generation stats back from a JSONL file. Malformed lines are skipped.
    pub fn read_jsonl(path: &Path) -> io::Result<Vec<GenerationStats>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(path)?);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(stats) = serde_json::from_str::<GenerationStats>(&line) {
                out.push(stats);
            }
        }
        Ok(out)
    }
}
