use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use racing_autopilot::config::{EvolutionConfig, LayoutKind, LevelSet, SimulationConfig};
use racing_autopilot::evaluate::{run_evaluate, EvaluateConfig};
use racing_autopilot::evolution::run_training;
use racing_autopilot::keys::KeyScript;
use racing_autopilot::runner::{driver_genome, run_autonomous, run_player, run_versus, RunMetrics};
use racing_autopilot::storage::{load_track_or_reference, save_track};
use racing_autopilot::util::{parse_seed, seed_to_hex};
use racing_core::Track;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "racing-autopilot")]
#[command(about = "Headless fuzzy-controller racing lab: drive, race and evolve controllers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the simulation in one of its modes
    Run {
        #[arg(long, value_enum, default_value_t = CliMode::Autonomous)]
        mode: CliMode,
        #[command(flatten)]
        sim: SimArgs,
        /// Key script for player and versus modes, e.g. "40xA,10xAL,A"
        #[arg(long)]
        keys: Option<String>,
        #[command(flatten)]
        evo: EvoArgs,
    },
    /// Rank every stored individual on the track
    Evaluate {
        #[command(flatten)]
        sim: SimArgs,
        /// Individuals file to rank (defaults to the elites file)
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Write the built-in reference circuit as track JSON
    ExportTrack {
        #[arg(long, default_value = "tracks/reference.json")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SimArgs {
    #[arg(long)]
    track: Option<PathBuf>,
    #[arg(long)]
    elites: Option<PathBuf>,
    #[arg(long)]
    max_ticks: Option<u32>,
    #[arg(long, value_enum)]
    levels: Option<CliLevels>,
    /// Infer directly instead of through precomputed decision tables
    #[arg(long, default_value_t = false)]
    no_lookup: bool,
}

#[derive(Args, Debug)]
struct EvoArgs {
    #[arg(long)]
    generations: Option<u32>,
    #[arg(long)]
    population: Option<usize>,
    #[arg(long)]
    elite_count: Option<usize>,
    #[arg(long)]
    random_quota: Option<usize>,
    #[arg(long)]
    mutation_rate: Option<f64>,
    #[arg(long)]
    mutation_scale: Option<f64>,
    #[arg(long)]
    budget_step: Option<u32>,
    #[arg(long)]
    min_budget: Option<u32>,
    #[arg(long)]
    seed: Option<String>,
    #[arg(long)]
    jobs: Option<usize>,
    #[arg(long)]
    out_dir: Option<PathBuf>,
    #[arg(long, value_enum)]
    layout: Option<CliLayout>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CliMode {
    Autonomous,
    Player,
    Versus,
    Train,
}

impl CliMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Autonomous => "autonomous",
            Self::Player => "player",
            Self::Versus => "versus",
            Self::Train => "train",
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliLevels {
    Standard,
    Coarse,
}

impl From<CliLevels> for LevelSet {
    fn from(value: CliLevels) -> Self {
        match value {
            CliLevels::Standard => LevelSet::Standard,
            CliLevels::Coarse => LevelSet::Coarse,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliLayout {
    Trimmed,
    Full,
}

impl From<CliLayout> for LayoutKind {
    fn from(value: CliLayout) -> Self {
        match value {
            CliLayout::Trimmed => LayoutKind::Trimmed,
            CliLayout::Full => LayoutKind::Full,
        }
    }
}

impl SimArgs {
    fn resolve(self) -> Result<SimulationConfig> {
        let mut sim = SimulationConfig::from_env();
        if let Some(track) = self.track {
            sim.track_path = track;
        }
        if let Some(elites) = self.elites {
            sim.elite_path = elites;
        }
        if let Some(max_ticks) = self.max_ticks {
            sim.max_ticks = max_ticks;
        }
        if let Some(levels) = self.levels {
            sim.levels = levels.into();
        }
        if self.no_lookup {
            sim.lookup = false;
        }
        sim.validate()?;
        Ok(sim)
    }
}

impl EvoArgs {
    fn resolve(self) -> Result<EvolutionConfig> {
        let mut evo = EvolutionConfig::from_env();
        if let Some(value) = self.generations {
            evo.generations = value;
        }
        if let Some(value) = self.population {
            evo.population = value;
        }
        if let Some(value) = self.elite_count {
            evo.elites = value;
        }
        if let Some(value) = self.random_quota {
            evo.random_quota = value;
        }
        if let Some(value) = self.mutation_rate {
            evo.mutation.rate = value;
        }
        if let Some(value) = self.mutation_scale {
            evo.mutation.scale = value;
        }
        if let Some(value) = self.budget_step {
            evo.budget_step_ticks = value;
        }
        if let Some(value) = self.min_budget {
            evo.min_budget_ticks = value;
        }
        if let Some(seed) = self.seed {
            evo.seed = parse_seed(&seed)?;
        }
        if self.jobs.is_some() {
            evo.jobs = self.jobs;
        }
        if let Some(out_dir) = self.out_dir {
            evo.out_dir = out_dir;
        }
        if let Some(layout) = self.layout {
            evo.layout = layout.into();
        }
        evo.validate()?;
        Ok(evo)
    }
}

fn print_metrics(prefix: &str, metrics: &RunMetrics) {
    println!("{prefix}driver={}", metrics.driver);
    println!("{prefix}ticks={}", metrics.ticks);
    println!("{prefix}fitness={}", metrics.fitness);
    println!("{prefix}next_checkpoint={}", metrics.next_checkpoint);
    println!("{prefix}alive={}", metrics.alive);
    println!(
        "{prefix}death_cause={}",
        metrics.death_cause.as_deref().unwrap_or("none")
    );
    println!("{prefix}distance={:.2}", metrics.distance);
    println!(
        "{prefix}final_pose=({:.2},{:.2}) heading={:.2} speed={:.2}",
        metrics.final_x, metrics.final_y, metrics.final_heading_deg, metrics.final_speed
    );
}

fn require_keys(keys: Option<String>, mode: CliMode) -> Result<KeyScript> {
    match keys {
        Some(raw) => KeyScript::parse(&raw),
        None => Err(anyhow!("--keys is required in {} mode", mode.as_str())),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match Cli::parse().command {
        Commands::Run {
            mode,
            sim,
            keys,
            evo,
        } => {
            let sim = sim.resolve()?;
            let track = load_track_or_reference(&sim.track_path)?;
            println!("mode={}", mode.as_str());
            println!("track_checkpoints={}", track.checkpoints.len());
            println!("levels={}", sim.levels.as_str());
            println!("lookup={}", sim.lookup);

            match mode {
                CliMode::Autonomous => {
                    let genome = driver_genome(&sim)?;
                    let metrics = run_autonomous(&sim, &track, &genome)?;
                    print_metrics("", &metrics);
                }
                CliMode::Player => {
                    let script = require_keys(keys, mode)?;
                    println!("script_ticks={}", script.total_ticks());
                    let metrics = run_player(&sim, &track, &script);
                    print_metrics("", &metrics);
                }
                CliMode::Versus => {
                    let script = require_keys(keys, mode)?;
                    println!("script_ticks={}", script.total_ticks());
                    let genome = driver_genome(&sim)?;
                    let outcome = run_versus(&sim, &track, &genome, &script)?;
                    println!("winner={}", outcome.winner.as_str());
                    println!("ticks={}", outcome.ticks);
                    print_metrics("player_", &outcome.player);
                    print_metrics("fuzzy_", &outcome.fuzzy);
                }
                CliMode::Train => {
                    let evo = evo.resolve()?;
                    let summary = run_training(&sim, &evo, &track)?;
                    println!("generations={}", summary.generations);
                    println!("vehicles_per_generation={}", evo.vehicles_per_generation());
                    println!("layout={}", summary.layout);
                    println!("seed={}", seed_to_hex(evo.seed));
                    println!(
                        "jobs={}",
                        evo.jobs
                            .map(|value| value.to_string())
                            .unwrap_or_else(|| "auto".to_string())
                    );
                    println!("best_fitness={}", summary.best_fitness);
                    println!(
                        "best_generation={}",
                        summary
                            .best_generation
                            .map(|value| value.to_string())
                            .unwrap_or_else(|| "none".to_string())
                    );
                    println!("elites={}", summary.elite_path);
                    println!("out_dir={}", summary.out_dir);
                }
            }
        }
        Commands::Evaluate {
            sim,
            input,
            out_dir,
            jobs,
        } => {
            let sim = sim.resolve()?;
            let track = load_track_or_reference(&sim.track_path)?;
            let config = EvaluateConfig {
                individuals_path: input.unwrap_or_else(|| sim.elite_path.clone()),
                out_dir: out_dir.unwrap_or_else(|| PathBuf::from("data/ga_train/evaluate")),
                jobs,
            };
            if config.jobs == Some(0) {
                return Err(anyhow!("--jobs must be >= 1 when provided"));
            }
            let report = run_evaluate(&sim, &track, &config)?;
            println!("evaluated={}", report.evaluated);
            println!("failed={}", report.failed);
            println!("best_fitness={}", report.best_fitness);
            println!("out_dir={}", config.out_dir.display());
            println!("top individuals:");
            for row in report.rankings.iter().take(5) {
                if let Some(metrics) = &row.metrics {
                    println!(
                        "  {}. line={} fitness={} ticks={} distance={:.1} death={}",
                        row.rank,
                        row.index + 1,
                        metrics.fitness,
                        metrics.ticks,
                        metrics.distance,
                        metrics.death_cause.as_deref().unwrap_or("none"),
                    );
                }
            }
        }
        Commands::ExportTrack { output } => {
            let track = Track::reference();
            save_track(&output, &track)?;
            println!("wrote={}", output.display());
            println!("outer_points={}", track.outer.len());
            println!("inner_points={}", track.inner.len());
            println!("checkpoints={}", track.checkpoints.len());
        }
    }

    Ok(())
}
