//! Evolution controller: drives generation cycles.
//!
//! One cycle walks `Idle → Evaluating → Selecting → Reproducing → Replacing`
//! and back to `Idle`. The controller never mutates the population it is
//! handed: a cycle returns the next generation, and the caller swaps it in.
//! Only one cycle may be in flight per controller; a second request fails
//! fast instead of queueing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use darwinfi_core::genome::StrategyGenome;
use darwinfi_core::rng::RngHierarchy;
use darwinfi_core::scenario::{MarketCondition, PresetScenarios, ScenarioProvider};

use crate::config::{ConfigError, EvolutionConfig};
use crate::evaluator::FitnessEvaluator;
use crate::history::EvolutionHistory;
use crate::operators::{crossover, mutate, specialize};
use crate::population::Population;

/// Parents needed before reproduction can run.
pub const MIN_PARENTS: usize = 2;

const SEED_STREAM: &str = "seed";
const REPRODUCE_STREAM: &str = "reproduce";

// ─── States, outcomes, errors ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvolutionState {
    Idle,
    Evaluating,
    Selecting,
    Reproducing,
    Replacing,
    /// Terminal: `max_generations` has been reached.
    Completed,
}

#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error("a generation cycle is already in progress (state: {0:?})")]
    CycleInProgress(EvolutionState),

    #[error("evolution completed: max_generations ({max_generations}) reached")]
    Completed { max_generations: u32 },

    #[error("evolution cancelled")]
    Cancelled,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("failed to build evaluation thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Why a cycle did not advance the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    InsufficientParents { eligible: usize, required: usize },
}

/// Offspring produced by each operator in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffspringCounts {
    pub crossover: usize,
    pub mutation: usize,
    pub specialization: usize,
}

impl OffspringCounts {
    pub fn total(&self) -> usize {
        self.crossover + self.mutation + self.specialization
    }
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Generation of the returned population.
    pub generation: u32,
    pub elites: usize,
    pub parents: usize,
    pub offspring: OffspringCounts,
    /// Genomes scored during this cycle's evaluation step.
    pub evaluated: usize,
    pub failed: usize,
    /// Best usable fitness of the population the cycle started from.
    pub parent_best: Option<f64>,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The next generation. Elites carry their reports; offspring are unscored.
    Advanced {
        population: Population,
        generation: u32,
        report: CycleReport,
    },
    /// Nothing changed; the caller keeps its population.
    Skipped { reason: SkipReason },
}

// ─── Cycle guard ─────────────────────────────────────────────────────

fn lock(state: &Mutex<EvolutionState>) -> MutexGuard<'_, EvolutionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the controller "busy" for one cycle. Dropping it returns the state
/// to `Idle` unless the cycle marked evolution `Completed`.
struct CycleGuard<'a> {
    state: &'a Mutex<EvolutionState>,
}

impl<'a> CycleGuard<'a> {
    fn enter(
        state: &'a Mutex<EvolutionState>,
        generation: u32,
        max_generations: Option<u32>,
    ) -> Result<Self, EvolutionError> {
        let mut current = lock(state);
        match *current {
            EvolutionState::Idle => {}
            EvolutionState::Completed => {
                return Err(EvolutionError::Completed {
                    max_generations: max_generations.unwrap_or(generation),
                })
            }
            busy => return Err(EvolutionError::CycleInProgress(busy)),
        }
        if let Some(max) = max_generations {
            if generation >= max {
                *current = EvolutionState::Completed;
                return Err(EvolutionError::Completed {
                    max_generations: max,
                });
            }
        }
        *current = EvolutionState::Evaluating;
        Ok(Self { state })
    }

    fn advance(&self, next: EvolutionState) {
        *lock(self.state) = next;
        debug!(state = ?next, "cycle state");
    }

    fn complete(self) {
        *lock(self.state) = EvolutionState::Completed;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let mut current = lock(self.state);
        if *current != EvolutionState::Completed {
            *current = EvolutionState::Idle;
        }
    }
}

// ─── evolve() types ──────────────────────────────────────────────────

/// Progress snapshot passed to the `evolve` callback after each generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    pub generation: u32,
    pub generations_run: u32,
    pub generations_requested: u32,
    pub best_fitness: f64,
    pub average_fitness: f64,
    pub best_ever_fitness: Option<f64>,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Ran every requested generation.
    GenerationsRun,
    /// `max_generations` reached.
    MaxGenerations,
    /// Best fitness flat for `stagnation_limit` generations.
    Stagnated,
    /// A cycle was skipped; rerunning it would skip again.
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCycle {
    pub generation: u32,
    pub reason: SkipReason,
}

/// Result of [`EvolutionController::evolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionRun {
    pub seed: u64,
    /// Last fully scored population.
    pub population: Population,
    pub history: EvolutionHistory,
    pub skipped: Vec<SkippedCycle>,
    pub stop_reason: StopReason,
    pub elapsed_secs: f64,
}

impl EvolutionRun {
    pub fn best(&self) -> Option<&StrategyGenome> {
        self.population.best()
    }
}

// ─── Controller ──────────────────────────────────────────────────────

pub struct EvolutionController {
    config: EvolutionConfig,
    seed: u64,
    rng: RngHierarchy,
    evaluator: FitnessEvaluator,
    pool: Option<rayon::ThreadPool>,
    state: Mutex<EvolutionState>,
}

impl std::fmt::Debug for EvolutionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvolutionController")
            .field("seed", &self.seed)
            .field("state", &self.state())
            .field("population_size", &self.config.population_size)
            .finish()
    }
}

impl EvolutionController {
    /// Validate `config`, resolve the seed and build the evaluator.
    pub fn new(
        config: EvolutionConfig,
        provider: &dyn ScenarioProvider,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let seed = config.resolve_seed();

        let pool = if config.eval_threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.eval_threads)
                    .build()?,
            )
        } else {
            None
        };

        let evaluator =
            FitnessEvaluator::new(provider, config.simulation.clone(), config.weights, seed);
        info!(
            seed,
            population_size = config.population_size,
            scenarios = evaluator.scenarios().len(),
            eval_threads = config.eval_threads,
            "evolution controller ready"
        );

        Ok(Self {
            config,
            seed,
            rng: RngHierarchy::new(seed),
            evaluator,
            pool,
            state: Mutex::new(EvolutionState::Idle),
        })
    }

    /// Controller evaluating against the five preset scenarios.
    pub fn with_presets(config: EvolutionConfig) -> Result<Self, EvolutionError> {
        Self::new(config, &PresetScenarios)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    pub fn state(&self) -> EvolutionState {
        *lock(&self.state)
    }

    /// Leave `Completed` so cycles may run again (e.g. after raising the limit).
    pub fn reset(&self) -> Result<(), EvolutionError> {
        let mut current = lock(&self.state);
        match *current {
            EvolutionState::Idle | EvolutionState::Completed => {
                *current = EvolutionState::Idle;
                Ok(())
            }
            busy => Err(EvolutionError::CycleInProgress(busy)),
        }
    }

    /// Deterministic generation-0 population of `size` random genomes.
    pub fn seed_population(&self, size: usize) -> Population {
        let mut rng = self.rng.rng_for(SEED_STREAM, "", 0);
        Population::random(size, &mut rng)
    }

    /// Copy of `population` with every genome scored.
    pub fn evaluate(&self, population: &Population) -> Population {
        let members = self
            .evaluator
            .score_all(population.members().to_vec(), self.pool.as_ref());
        Population::new(population.generation(), members)
    }

    fn evaluate_cancellable(
        &self,
        population: Population,
        cancel: Option<&AtomicBool>,
    ) -> Result<Population, EvolutionError> {
        let generation = population.generation();
        self.evaluator
            .evaluate_all(population.into_members(), self.pool.as_ref(), cancel)
            .map(|members| Population::new(generation, members))
            .ok_or(EvolutionError::Cancelled)
    }

    /// Run one generation cycle on `population`.
    pub fn run_generation_cycle(
        &self,
        population: &Population,
    ) -> Result<CycleOutcome, EvolutionError> {
        self.run_generation_cycle_with_cancel(population, None)
    }

    /// [`Self::run_generation_cycle`] with a cooperative cancel flag, checked
    /// between genome evaluations and between cycle stages.
    pub fn run_generation_cycle_with_cancel(
        &self,
        population: &Population,
        cancel: Option<&AtomicBool>,
    ) -> Result<CycleOutcome, EvolutionError> {
        let guard = CycleGuard::enter(
            &self.state,
            population.generation(),
            self.config.max_generations,
        )?;
        let started = Instant::now();

        // Reject upfront when the population is too small to ever yield two parents.
        let parent_slots = self.config.parent_count(population.len());
        if parent_slots < MIN_PARENTS {
            return Ok(self.skip(population.generation(), parent_slots));
        }

        // ── Evaluating ──
        let unscored = population.unscored_count();
        let evaluated = self.evaluate_cancellable(population.clone(), cancel)?;
        let failed = evaluated
            .members()
            .iter()
            .filter(|g| g.fitness().is_some_and(|r| r.failed))
            .count();

        // ── Selecting ──
        guard.advance(EvolutionState::Selecting);
        let mut elites = evaluated.select_elites(self.config.elite_fraction);
        elites.truncate(self.config.population_size);
        let parents = evaluated.select_parents(self.config.selection_rate);
        if parents.len() < MIN_PARENTS {
            return Ok(self.skip(population.generation(), parents.len()));
        }
        check_cancel(cancel)?;

        // ── Reproducing ──
        guard.advance(EvolutionState::Reproducing);
        let slots = self.config.population_size - elites.len();
        let mut rng = self
            .rng
            .rng_for(REPRODUCE_STREAM, "", u64::from(population.generation()));
        let (offspring, counts) = self.breed(&parents, slots, &mut rng);
        check_cancel(cancel)?;

        // ── Replacing ──
        guard.advance(EvolutionState::Replacing);
        let generation = population.generation() + 1;
        let elite_count = elites.len();
        let mut members = elites;
        members.extend(offspring);
        let next = Population::new(generation, members);

        let parent_best = evaluated.fitness_stats().map(|s| s.best);
        info!(
            generation,
            parent_best = parent_best.unwrap_or(f64::NAN),
            elites = elite_count,
            crossover = counts.crossover,
            mutation = counts.mutation,
            specialization = counts.specialization,
            failed,
            "generation advanced"
        );

        let report = CycleReport {
            generation,
            elites: elite_count,
            parents: parents.len(),
            offspring: counts,
            evaluated: unscored,
            failed,
            parent_best,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };

        match self.config.max_generations {
            Some(max) if generation >= max => {
                info!(generation, "max_generations reached");
                guard.complete();
            }
            _ => drop(guard),
        }

        Ok(CycleOutcome::Advanced {
            population: next,
            generation,
            report,
        })
    }

    fn skip(&self, generation: u32, eligible: usize) -> CycleOutcome {
        let reason = SkipReason::InsufficientParents {
            eligible,
            required: MIN_PARENTS,
        };
        warn!(
            generation,
            eligible,
            required = MIN_PARENTS,
            "not enough eligible parents, skipping cycle"
        );
        CycleOutcome::Skipped { reason }
    }

    /// Produce `slots` offspring from `parents` (at least two).
    fn breed<R: Rng + ?Sized>(
        &self,
        parents: &[&StrategyGenome],
        slots: usize,
        rng: &mut R,
    ) -> (Vec<StrategyGenome>, OffspringCounts) {
        let cfg = &self.config;
        let mut counts = OffspringCounts::default();
        let mut offspring = Vec::with_capacity(slots);

        while offspring.len() < slots {
            let child = if rng.gen_bool(cfg.crossover_rate) {
                let (a, b) = pick_two(parents, rng);
                counts.crossover += 1;
                crossover(a, b, &cfg.crossover, rng)
            } else if rng.gen_bool(cfg.specialization_rate) {
                let parent = parents[rng.gen_range(0..parents.len())];
                let condition = MarketCondition::ALL[rng.gen_range(0..MarketCondition::ALL.len())];
                counts.specialization += 1;
                specialize(
                    parent,
                    condition,
                    &cfg.specialization_overrides,
                    cfg.mutation_rate,
                    cfg.mutation_magnitude,
                    rng,
                )
            } else {
                let parent = parents[rng.gen_range(0..parents.len())];
                counts.mutation += 1;
                mutate(parent, cfg.mutation_rate, cfg.mutation_magnitude, rng)
            };
            offspring.push(child);
        }
        (offspring, counts)
    }

    /// Run up to `generations` cycles from `population`.
    ///
    /// Each new generation is scored before it is recorded, so the returned
    /// population and every history entry reflect fully evaluated genomes.
    pub fn evolve(
        &self,
        population: Population,
        generations: u32,
        progress: Option<&dyn Fn(&EvolutionProgress)>,
        cancel: Option<&AtomicBool>,
    ) -> Result<EvolutionRun, EvolutionError> {
        let started = Instant::now();
        let mut history = EvolutionHistory::new();
        let mut skipped = Vec::new();
        let mut stop_reason = StopReason::GenerationsRun;

        let mut current = self.evaluate_cancellable(population, cancel)?;
        history.record(&current, started.elapsed().as_secs_f64());

        let mut generations_run = 0;
        while generations_run < generations {
            if is_cancelled(cancel) {
                stop_reason = StopReason::Cancelled;
                break;
            }
            let cycle_started = Instant::now();

            match self.run_generation_cycle_with_cancel(&current, cancel) {
                Ok(CycleOutcome::Advanced { population, .. }) => {
                    current = match self.evaluate_cancellable(population, cancel) {
                        Ok(scored) => scored,
                        Err(EvolutionError::Cancelled) => {
                            stop_reason = StopReason::Cancelled;
                            break;
                        }
                        Err(e) => return Err(e),
                    };
                }
                Ok(CycleOutcome::Skipped { reason }) => {
                    skipped.push(SkippedCycle {
                        generation: current.generation(),
                        reason,
                    });
                    stop_reason = StopReason::Skipped;
                    break;
                }
                Err(EvolutionError::Cancelled) => {
                    stop_reason = StopReason::Cancelled;
                    break;
                }
                Err(EvolutionError::Completed { .. }) => {
                    stop_reason = StopReason::MaxGenerations;
                    break;
                }
                Err(e) => return Err(e),
            }

            generations_run += 1;
            let stats = history.record(&current, cycle_started.elapsed().as_secs_f64());
            let (best_fitness, average_fitness) = (stats.best_fitness, stats.average_fitness);

            if let Some(cb) = progress {
                cb(&EvolutionProgress {
                    generation: current.generation(),
                    generations_run,
                    generations_requested: generations,
                    best_fitness,
                    average_fitness,
                    best_ever_fitness: history.best_ever().and_then(|g| g.fitness_score()),
                    elapsed_secs: started.elapsed().as_secs_f64(),
                });
            }

            if let Some(limit) = self.config.stagnation_limit {
                if history.stagnation() >= limit as usize {
                    info!(
                        generation = current.generation(),
                        limit, "best fitness stagnated, stopping"
                    );
                    stop_reason = StopReason::Stagnated;
                    break;
                }
            }
        }

        if stop_reason == StopReason::GenerationsRun && self.state() == EvolutionState::Completed {
            stop_reason = StopReason::MaxGenerations;
        }

        let elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            generations_run,
            final_generation = current.generation(),
            best = current.best().and_then(|g| g.fitness_score()).unwrap_or(f64::NAN),
            stop = ?stop_reason,
            elapsed_secs,
            "evolution finished"
        );

        Ok(EvolutionRun {
            seed: self.seed,
            population: current,
            history,
            skipped,
            stop_reason,
            elapsed_secs,
        })
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}

fn check_cancel(cancel: Option<&AtomicBool>) -> Result<(), EvolutionError> {
    if is_cancelled(cancel) {
        return Err(EvolutionError::Cancelled);
    }
    Ok(())
}

/// Two distinct parents, uniformly.
fn pick_two<'p, R: Rng + ?Sized>(
    parents: &[&'p StrategyGenome],
    rng: &mut R,
) -> (&'p StrategyGenome, &'p StrategyGenome) {
    let i = rng.gen_range(0..parents.len());
    let mut j = rng.gen_range(0..parents.len() - 1);
    if j >= i {
        j += 1;
    }
    (parents[i], parents[j])
}
