use crate::config::SimulationConfig;
use crate::keys::KeyScript;
use crate::storage::read_individuals;
use anyhow::{anyhow, Context, Result};
use racing_core::constants::REFERENCE_GENOME;
use racing_core::{FuzzyController, Genome, GenomeError, KeyState, Track, Vehicle};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct RunMetrics {
    pub driver: String,
    pub max_ticks: u32,
    pub ticks: u32,
    pub fitness: u32,
    pub next_checkpoint: usize,
    pub alive: bool,
    pub death_cause: Option<String>,
    pub distance: f64,
    pub final_x: f64,
    pub final_y: f64,
    pub final_heading_deg: f64,
    pub final_speed: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Player,
    Fuzzy,
    Undecided,
}

impl Winner {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Fuzzy => "fuzzy",
            Self::Undecided => "undecided",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct VersusOutcome {
    pub winner: Winner,
    pub ticks: u32,
    pub player: RunMetrics,
    pub fuzzy: RunMetrics,
}

pub fn build_controller(
    genome: &[f64],
    sim: &SimulationConfig,
) -> Result<FuzzyController, GenomeError> {
    let controller = FuzzyController::from_genome(genome)?.with_levels(sim.levels.levels());
    Ok(if sim.lookup {
        controller.with_lookup(sim.grid)
    } else {
        controller
    })
}

pub fn build_vehicle(genome: &[f64], sim: &SimulationConfig) -> Result<Vehicle, GenomeError> {
    let controller = build_controller(genome, sim)?;
    Ok(
        Vehicle::autonomous(Box::new(controller), sim.start, sim.start_heading_deg)
            .with_max_speed(sim.max_speed)
            .with_sensor_range(sim.sensor_range),
    )
}

pub fn player_vehicle(sim: &SimulationConfig) -> Vehicle {
    Vehicle::player(sim.start, sim.start_heading_deg)
        .with_max_speed(sim.max_speed)
        .with_sensor_range(sim.sensor_range)
}

/// Best stored elite, or the hand-tuned genome when none is stored.
pub fn driver_genome(sim: &SimulationConfig) -> Result<Genome> {
    let stored = read_individuals(&sim.elite_path)?;
    match stored.into_iter().next() {
        Some(genome) => {
            tracing::info!(path = %sim.elite_path.display(), "driving the top stored elite");
            Ok(genome)
        }
        None => {
            tracing::info!("no stored elites, driving the hand-tuned controller");
            Ok(REFERENCE_GENOME.to_vec())
        }
    }
}

/// Per-run bookkeeping shared by every driving mode.
struct Tracker {
    ticks: u32,
    distance: f64,
}

impl Tracker {
    fn new() -> Self {
        Self {
            ticks: 0,
            distance: 0.0,
        }
    }

    /// Tick `vehicle` once; false once it is dead.
    fn step(&mut self, vehicle: &mut Vehicle, track: &Track, keys: KeyState) -> bool {
        let before = vehicle.position();
        if vehicle.update_with_keys(track, keys).is_none() {
            return false;
        }
        self.ticks += 1;
        self.distance += before.distance(vehicle.position());
        true
    }

    fn finish(&self, driver: &str, vehicle: &Vehicle, max_ticks: u32) -> RunMetrics {
        let position = vehicle.position();
        RunMetrics {
            driver: driver.to_string(),
            max_ticks,
            ticks: self.ticks,
            fitness: vehicle.fitness(),
            next_checkpoint: vehicle.next_checkpoint(),
            alive: vehicle.is_alive(),
            death_cause: vehicle.death_cause().map(|cause| cause.as_str().to_string()),
            distance: self.distance,
            final_x: position.x,
            final_y: position.y,
            final_heading_deg: vehicle.heading_deg(),
            final_speed: vehicle.speed(),
        }
    }
}

/// Drive `vehicle` until it dies or `max_ticks` ticks have run.
pub fn run_vehicle(vehicle: &mut Vehicle, track: &Track, max_ticks: u32, driver: &str) -> RunMetrics {
    let mut tracker = Tracker::new();
    while tracker.ticks < max_ticks && tracker.step(vehicle, track, KeyState::default()) {}
    tracker.finish(driver, vehicle, max_ticks)
}

pub fn run_autonomous(sim: &SimulationConfig, track: &Track, genome: &[f64]) -> Result<RunMetrics> {
    let mut vehicle = build_vehicle(genome, sim).context("driver genome is malformed")?;
    Ok(run_vehicle(&mut vehicle, track, sim.max_ticks, "fuzzy"))
}

/// Replay `script` on a player vehicle until it dies, the script ends or the
/// tick cap is reached.
pub fn run_player(sim: &SimulationConfig, track: &Track, script: &KeyScript) -> RunMetrics {
    let mut vehicle = player_vehicle(sim);
    let mut tracker = Tracker::new();
    for keys in script.ticks() {
        if tracker.ticks >= sim.max_ticks || !tracker.step(&mut vehicle, track, keys) {
            break;
        }
    }
    tracker.finish("player", &vehicle, sim.max_ticks)
}

/// Player against the fuzzy driver on one track. The first to score a
/// checkpoint wins; a vehicle that dies loses. Player results are checked
/// first within a tick.
pub fn run_versus(
    sim: &SimulationConfig,
    track: &Track,
    genome: &[f64],
    script: &KeyScript,
) -> Result<VersusOutcome> {
    if track.checkpoints.is_empty() {
        return Err(anyhow!("versus mode needs a track with checkpoints"));
    }

    let mut player = player_vehicle(sim);
    let mut fuzzy = build_vehicle(genome, sim).context("driver genome is malformed")?;
    let mut player_tracker = Tracker::new();
    let mut fuzzy_tracker = Tracker::new();
    let mut keys = script.ticks();
    let mut ticks = 0u32;

    let winner = loop {
        if ticks >= sim.max_ticks {
            break Winner::Undecided;
        }
        let held = keys.next().unwrap_or_default();
        player_tracker.step(&mut player, track, held);
        fuzzy_tracker.step(&mut fuzzy, track, KeyState::default());
        ticks += 1;

        if player.fitness() >= 1 {
            break Winner::Player;
        }
        if fuzzy.fitness() >= 1 {
            break Winner::Fuzzy;
        }
        if !player.is_alive() {
            break Winner::Fuzzy;
        }
        if !fuzzy.is_alive() {
            break Winner::Player;
        }
    };

    Ok(VersusOutcome {
        winner,
        ticks,
        player: player_tracker.finish("player", &player, sim.max_ticks),
        fuzzy: fuzzy_tracker.finish("fuzzy", &fuzzy, sim.max_ticks),
    })
}
