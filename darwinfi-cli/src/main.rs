//! DarwinFi CLI: evolve trading strategies from the command line.
//!
//! Commands:
//! - `evolve`: run the genetic algorithm against preset or recorded scenarios
//! - `scenarios`: list the built-in evaluation scenarios
//! - `config`: print the default configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use darwinfi_core::data::load_price_csv;
use darwinfi_core::scenario::{PresetScenarios, ScenarioPreset, ScenarioProvider, StaticScenarios};
use darwinfi_runner::config::EvolutionConfig;
use darwinfi_runner::controller::{EvolutionController, EvolutionProgress, EvolutionRun};

#[derive(Parser)]
#[command(name = "darwinfi", about = "Evolutionary trading-strategy search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evolve a population of strategy genomes
    Evolve {
        /// Path to a TOML config file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of generation cycles to run
        #[arg(long, default_value = "10")]
        generations: u32,

        /// Master seed; overrides `random_seed` from the config
        #[arg(long)]
        seed: Option<u64>,

        /// Population size; overrides `population_size` from the config
        #[arg(long)]
        population: Option<usize>,

        /// CSV files of closing prices to evaluate against instead of the presets
        #[arg(long, num_args = 1..)]
        prices: Vec<PathBuf>,

        /// Write the full run (population, history, skips) as JSON
        #[arg(long)]
        output: Option<PathBuf>,

        /// Append per-generation stats as JSON lines
        #[arg(long)]
        history: Option<PathBuf>,

        /// Stop after this many generations without improvement
        #[arg(long)]
        stagnation: Option<u32>,
    },

    /// List the built-in evaluation scenarios
    Scenarios,

    /// Print the default configuration as TOML
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evolve {
            config,
            generations,
            seed,
            population,
            prices,
            output,
            history,
            stagnation,
        } => run_evolve(EvolveArgs {
            config,
            generations,
            seed,
            population,
            prices,
            output,
            history,
            stagnation,
        }),
        Commands::Scenarios => run_scenarios(),
        Commands::Config => run_print_config(),
    }
}

struct EvolveArgs {
    config: Option<PathBuf>,
    generations: u32,
    seed: Option<u64>,
    population: Option<usize>,
    prices: Vec<PathBuf>,
    output: Option<PathBuf>,
    history: Option<PathBuf>,
    stagnation: Option<u32>,
}

fn run_evolve(args: EvolveArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => EvolutionConfig::load(path)?,
        None => EvolutionConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.random_seed = Some(seed);
    }
    if let Some(size) = args.population {
        config.population_size = size;
    }
    if args.stagnation.is_some() {
        config.stagnation_limit = args.stagnation;
    }

    let provider = build_provider(&args.prices)?;
    let controller = EvolutionController::new(config, provider.as_ref())?;
    info!(
        seed = controller.seed(),
        population = controller.config().population_size,
        scenarios = controller.evaluator().scenarios().len(),
        generations = args.generations,
        "starting evolution"
    );
    for s in controller.evaluator().scenarios() {
        info!(
            scenario = %s.name,
            kind = if s.is_historical() { "recorded" } else { "synthetic" },
            volatility = format_args!("{:.4}", s.volatility),
            trend = format_args!("{:+.4}", s.trend),
            "evaluation scenario"
        );
    }

    let on_progress = |p: &EvolutionProgress| {
        info!(
            generation = p.generation,
            best = format_args!("{:.4}", p.best_fitness),
            average = format_args!("{:.4}", p.average_fitness),
            elapsed = format_args!("{:.2}s", p.elapsed_secs),
            "generation complete"
        );
    };

    let initial = controller.seed_population(controller.config().population_size);
    let run = controller.evolve(initial, args.generations, Some(&on_progress), None)?;

    print_summary(&run);

    if let Some(path) = &args.history {
        run.history
            .write_jsonl(path)
            .with_context(|| format!("writing history to {}", path.display()))?;
        println!("History appended to: {}", path.display());
    }
    if let Some(path) = &args.output {
        write_run(&run, path)?;
        println!("Run saved to: {}", path.display());
    }

    Ok(())
}

fn build_provider(prices: &[PathBuf]) -> Result<Box<dyn ScenarioProvider>> {
    if prices.is_empty() {
        return Ok(Box::new(PresetScenarios));
    }
    let scenarios = prices
        .iter()
        .map(|path| {
            load_price_csv(path).with_context(|| format!("loading prices from {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(StaticScenarios(scenarios)))
}

fn write_run(run: &EvolutionRun, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(run)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn print_summary(run: &EvolutionRun) {
    println!("Seed:          {}", run.seed);
    println!("Generation:    {}", run.population.generation());
    println!("Stop reason:   {:?}", run.stop_reason);
    println!("Elapsed:       {:.2}s", run.elapsed_secs);
    println!("Improvement:   {:+.4}", run.history.improvement());
    if let Some(last) = run.history.latest() {
        println!(
            "Final stats:   avg {:.4}  diversity {:.4}  gene spread {:.4}  failed {}",
            last.average_fitness, last.diversity, last.gene_spread, last.failed_count
        );
    }
    for skip in &run.skipped {
        println!("Skipped gen {}: {:?}", skip.generation, skip.reason);
    }

    let Some(best) = run.best() else {
        println!("No scored genomes.");
        return;
    };
    println!();
    println!("Best genome:   {best}");
    if let Some(report) = best.fitness() {
        println!("  fitness      {:.4}", report.fitness_score);
        println!("  return       {:.4}", report.total_return);
        println!("  sharpe       {:.4}", report.sharpe_ratio);
        println!("  worst dd     {:.4}", report.worst_drawdown);
        println!("  win rate     {:.4}", report.win_rate);
        for s in &report.scenarios {
            println!(
                "    {:<12} return {:>8.4}  sharpe {:>7.3}  dd {:>6.4}  trades {}",
                s.scenario, s.total_return, s.sharpe_ratio, s.max_drawdown, s.trade_count
            );
        }
    }
}

fn run_scenarios() -> Result<()> {
    println!("{:<12} {:>10} {:>10}", "name", "volatility", "trend");
    for preset in ScenarioPreset::ALL {
        let s = preset.scenario();
        println!("{:<12} {:>10.4} {:>10.4}", s.name, s.volatility, s.trend);
    }
    Ok(())
}

fn run_print_config() -> Result<()> {
    print!("{}", EvolutionConfig::default().to_toml_string()?);
    Ok(())
}
