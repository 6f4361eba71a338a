use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use racing_core::constants::{DEFAULT_MAX_SPEED, SENSOR_RANGE};
use racing_core::track::{REFERENCE_HEADING_DEG, REFERENCE_START};
use racing_core::{ActionLevels, GeneLayout, LookupGrid, MutationParams, Point};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TRACK_PATH: &str = "tracks/reference.json";
pub const DEFAULT_ELITE_PATH: &str = "data/ga_train/elite_individual.jsonl";
pub const DEFAULT_TRAIN_OUT_DIR: &str = "data/ga_train/reports";
pub const DEFAULT_MAX_TICKS: u32 = 36_000;

pub const DEFAULT_GENERATIONS: u32 = 100;
pub const DEFAULT_POPULATION: usize = 8;
pub const DEFAULT_ELITES: usize = 3;
pub const DEFAULT_RANDOM_QUOTA: usize = 2;
// 60 ticks per second of wall-clock racing
pub const DEFAULT_BUDGET_STEP_TICKS: u32 = 3_600;
pub const DEFAULT_MIN_BUDGET_TICKS: u32 = 14_400;
pub const DEFAULT_SEED: u64 = 0x5EED_CA75;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSet {
    Standard,
    Coarse,
}

impl LevelSet {
    pub fn levels(self) -> ActionLevels {
        match self {
            Self::Standard => ActionLevels::standard(),
            Self::Coarse => ActionLevels::coarse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Coarse => "coarse",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "coarse" => Some(Self::Coarse),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// 45 genes, output shapes fixed.
    Trimmed,
    /// 90 genes, output shapes evolved too.
    Full,
}

impl LayoutKind {
    pub fn layout(self) -> GeneLayout {
        match self {
            Self::Trimmed => GeneLayout::trimmed(),
            Self::Full => GeneLayout::full(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trimmed => "trimmed",
            Self::Full => "full",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trimmed" => Some(Self::Trimmed),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Everything a single simulated race needs.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub track_path: PathBuf,
    pub elite_path: PathBuf,
    pub start: Point,
    pub start_heading_deg: f64,
    pub max_speed: f64,
    pub sensor_range: f64,
    pub max_ticks: u32,
    /// Serve decisions from the precomputed grid instead of full inference.
    pub lookup: bool,
    pub grid: LookupGrid,
    pub levels: LevelSet,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            track_path: PathBuf::from(DEFAULT_TRACK_PATH),
            elite_path: PathBuf::from(DEFAULT_ELITE_PATH),
            start: REFERENCE_START,
            start_heading_deg: REFERENCE_HEADING_DEG,
            max_speed: DEFAULT_MAX_SPEED,
            sensor_range: SENSOR_RANGE,
            max_ticks: DEFAULT_MAX_TICKS,
            lookup: true,
            grid: LookupGrid::default(),
            levels: LevelSet::Standard,
        }
    }
}

impl SimulationConfig {
    /// Defaults overridden by `RACING_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let levels = match env::var("RACING_LEVELS") {
            Ok(raw) => LevelSet::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("RACING_LEVELS={raw} is not standard|coarse. Using standard.");
                defaults.levels
            }),
            Err(_) => defaults.levels,
        };

        Self {
            track_path: read_env_path("RACING_TRACK", defaults.track_path),
            elite_path: read_env_path("RACING_ELITES_FILE", defaults.elite_path),
            start: Point::new(
                read_env_f64("RACING_START_X", defaults.start.x),
                read_env_f64("RACING_START_Y", defaults.start.y),
            ),
            start_heading_deg: read_env_f64("RACING_START_HEADING", defaults.start_heading_deg),
            max_speed: read_env_f64("RACING_MAX_SPEED", defaults.max_speed),
            sensor_range: read_env_f64("RACING_SENSOR_RANGE", defaults.sensor_range),
            max_ticks: read_env_u32("RACING_MAX_TICKS", defaults.max_ticks),
            lookup: read_env_bool("RACING_LOOKUP", defaults.lookup),
            grid: defaults.grid,
            levels,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(anyhow!("max speed must be a positive number, got {}", self.max_speed));
        }
        if !(self.sensor_range.is_finite() && self.sensor_range > 0.0) {
            return Err(anyhow!(
                "sensor range must be a positive number, got {}",
                self.sensor_range
            ));
        }
        if !(self.start.x.is_finite() && self.start.y.is_finite() && self.start_heading_deg.is_finite())
        {
            return Err(anyhow!("start pose must be finite"));
        }
        if self.max_ticks == 0 {
            return Err(anyhow!("max ticks must be >= 1"));
        }
        for (name, step) in [
            ("speed", self.grid.speed_step),
            ("front", self.grid.front_step),
            ("side", self.grid.side_step),
        ] {
            if !(step.is_finite() && step > 0.0) {
                return Err(anyhow!("{name} grid step must be positive, got {step}"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EvolutionConfig {
    pub generations: u32,
    /// Elites plus bred offspring; fresh randoms come on top.
    pub population: usize,
    pub elites: usize,
    pub random_quota: usize,
    pub mutation: MutationParams,
    pub budget_step_ticks: u32,
    pub min_budget_ticks: u32,
    pub seed: u64,
    pub jobs: Option<usize>,
    pub out_dir: PathBuf,
    pub layout: LayoutKind,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            generations: DEFAULT_GENERATIONS,
            population: DEFAULT_POPULATION,
            elites: DEFAULT_ELITES,
            random_quota: DEFAULT_RANDOM_QUOTA,
            mutation: MutationParams::default(),
            budget_step_ticks: DEFAULT_BUDGET_STEP_TICKS,
            min_budget_ticks: DEFAULT_MIN_BUDGET_TICKS,
            seed: DEFAULT_SEED,
            jobs: None,
            out_dir: PathBuf::from(DEFAULT_TRAIN_OUT_DIR),
            layout: LayoutKind::Trimmed,
        }
    }
}

impl EvolutionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let layout = match env::var("RACING_LAYOUT") {
            Ok(raw) => LayoutKind::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("RACING_LAYOUT={raw} is not trimmed|full. Using trimmed.");
                defaults.layout
            }),
            Err(_) => defaults.layout,
        };

        Self {
            generations: read_env_u32("RACING_GENERATIONS", defaults.generations),
            population: read_env_usize("RACING_POPULATION", defaults.population),
            elites: read_env_count("RACING_ELITES", defaults.elites),
            random_quota: read_env_count("RACING_RANDOM_QUOTA", defaults.random_quota),
            mutation: MutationParams {
                rate: read_env_f64("RACING_MUTATION_RATE", defaults.mutation.rate),
                scale: read_env_f64("RACING_MUTATION_SCALE", defaults.mutation.scale),
            },
            budget_step_ticks: read_env_u32("RACING_BUDGET_STEP", defaults.budget_step_ticks),
            min_budget_ticks: read_env_u32("RACING_MIN_BUDGET", defaults.min_budget_ticks),
            seed: read_env_seed("RACING_SEED", defaults.seed),
            jobs: read_env_optional_usize("RACING_JOBS"),
            out_dir: read_env_path("RACING_OUT_DIR", defaults.out_dir),
            layout,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.population < 2 {
            return Err(anyhow!(
                "population must be >= 2 to breed, got {}",
                self.population
            ));
        }
        if self.elites > self.population {
            return Err(anyhow!(
                "elite count ({}) cannot exceed population ({})",
                self.elites,
                self.population
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation.rate) {
            return Err(anyhow!(
                "mutation rate must be in [0, 1], got {}",
                self.mutation.rate
            ));
        }
        if !(self.mutation.scale.is_finite() && self.mutation.scale >= 0.0) {
            return Err(anyhow!(
                "mutation scale must be >= 0, got {}",
                self.mutation.scale
            ));
        }
        if self.budget_step_ticks == 0 && self.min_budget_ticks == 0 {
            return Err(anyhow!("tick budget step and floor cannot both be zero"));
        }
        if let Some(jobs) = self.jobs {
            if jobs == 0 {
                return Err(anyhow!("--jobs must be >= 1 when provided"));
            }
        }
        Ok(())
    }

    /// Vehicles raced per generation.
    pub fn vehicles_per_generation(&self) -> usize {
        self.population + self.random_quota
    }

    /// Tick budget of generation `generation` (0-based).
    pub fn tick_budget(&self, generation: u32) -> u32 {
        generation
            .saturating_add(1)
            .saturating_mul(self.budget_step_ticks)
            .max(self.min_budget_ticks)
    }
}

pub(crate) fn read_env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

/// Decimal or `0x` hex; zero is a valid seed.
pub(crate) fn read_env_seed(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| crate::util::parse_seed(&value).ok())
        .unwrap_or(default)
}

pub(crate) fn read_env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

/// Like `read_env_usize` but zero is kept, for counts that may be disabled.
pub(crate) fn read_env_count(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

pub(crate) fn read_env_optional_usize(name: &str) -> Option<usize> {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
}

pub(crate) fn read_env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
}

pub(crate) fn read_env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

pub(crate) fn read_env_path(name: &str, default: PathBuf) -> PathBuf {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SimulationConfig::default().validate().expect("simulation defaults");
        let evolution = EvolutionConfig::default();
        evolution.validate().expect("evolution defaults");
        assert_eq!(evolution.vehicles_per_generation(), 10);
    }

    #[test]
    fn tick_budget_grows_past_the_floor() {
        let config = EvolutionConfig {
            budget_step_ticks: 100,
            min_budget_ticks: 250,
            ..EvolutionConfig::default()
        };
        assert_eq!(config.tick_budget(0), 250);
        assert_eq!(config.tick_budget(1), 250);
        assert_eq!(config.tick_budget(2), 300);
        assert_eq!(config.tick_budget(9), 1_000);
    }

    #[test]
    fn env_numbers_apply_and_ignore_zero_or_garbage() {
        env::set_var("RACING_TEST_U32_SET", "42");
        env::set_var("RACING_TEST_U32_ZERO", "0");
        env::set_var("RACING_TEST_U32_JUNK", "forty");
        assert_eq!(read_env_u32("RACING_TEST_U32_SET", 7), 42);
        assert_eq!(read_env_u32("RACING_TEST_U32_ZERO", 7), 7);
        assert_eq!(read_env_u32("RACING_TEST_U32_JUNK", 7), 7);
        assert_eq!(read_env_u32("RACING_TEST_U32_UNSET", 7), 7);

        env::set_var("RACING_TEST_USIZE_ZERO", "0");
        env::set_var("RACING_TEST_JOBS_ZERO", "0");
        env::set_var("RACING_TEST_JOBS_SET", "3");
        assert_eq!(read_env_usize("RACING_TEST_USIZE_ZERO", 5), 5);
        assert_eq!(read_env_optional_usize("RACING_TEST_JOBS_ZERO"), None);
        assert_eq!(read_env_optional_usize("RACING_TEST_JOBS_SET"), Some(3));

        env::set_var("RACING_TEST_F64_SET", " 1.5 ");
        env::set_var("RACING_TEST_F64_NAN", "NaN");
        assert_eq!(read_env_f64("RACING_TEST_F64_SET", 2.0), 1.5);
        assert_eq!(read_env_f64("RACING_TEST_F64_NAN", 2.0), 2.0);
    }

    #[test]
    fn env_counts_and_seed_accept_zero() {
        env::set_var("RACING_TEST_COUNT_ZERO", "0");
        env::set_var("RACING_TEST_COUNT_JUNK", "-1");
        env::set_var("RACING_TEST_SEED_ZERO", "0");
        env::set_var("RACING_TEST_SEED_HEX", "0xff");
        env::set_var("RACING_TEST_SEED_JUNK", "seed");
        assert_eq!(read_env_count("RACING_TEST_COUNT_ZERO", 3), 0);
        assert_eq!(read_env_count("RACING_TEST_COUNT_JUNK", 3), 3);
        assert_eq!(read_env_seed("RACING_TEST_SEED_ZERO", 9), 0);
        assert_eq!(read_env_seed("RACING_TEST_SEED_HEX", 9), 255);
        assert_eq!(read_env_seed("RACING_TEST_SEED_JUNK", 9), 9);
    }

    #[test]
    fn env_flags_and_paths() {
        env::set_var("RACING_TEST_BOOL_OFF", "Off");
        env::set_var("RACING_TEST_BOOL_JUNK", "maybe");
        env::set_var("RACING_TEST_PATH_EMPTY", "");
        env::set_var("RACING_TEST_PATH_SET", "tracks/other.json");
        assert!(!read_env_bool("RACING_TEST_BOOL_OFF", true));
        assert!(read_env_bool("RACING_TEST_BOOL_JUNK", true));
        assert_eq!(
            read_env_path("RACING_TEST_PATH_EMPTY", PathBuf::from("fallback")),
            PathBuf::from("fallback")
        );
        assert_eq!(
            read_env_path("RACING_TEST_PATH_SET", PathBuf::from("fallback")),
            PathBuf::from("tracks/other.json")
        );
    }

    // The only test that touches the real RACING_* names.
    #[test]
    fn from_env_layers_over_defaults() {
        env::set_var("RACING_POPULATION", "12");
        env::set_var("RACING_GENERATIONS", "0");
        env::set_var("RACING_ELITES", "0");
        env::set_var("RACING_SEED", "0");
        env::set_var("RACING_LAYOUT", "sideways");
        env::set_var("RACING_MAX_TICKS", "500");
        env::set_var("RACING_LEVELS", "fine");
        env::set_var("RACING_LOOKUP", "no");

        let evo = EvolutionConfig::from_env();
        let sim = SimulationConfig::from_env();
        for name in [
            "RACING_POPULATION",
            "RACING_GENERATIONS",
            "RACING_ELITES",
            "RACING_SEED",
            "RACING_LAYOUT",
            "RACING_MAX_TICKS",
            "RACING_LEVELS",
            "RACING_LOOKUP",
        ] {
            env::remove_var(name);
        }

        assert_eq!(evo.population, 12);
        assert_eq!(evo.generations, DEFAULT_GENERATIONS);
        assert_eq!(evo.elites, 0);
        assert_eq!(evo.seed, 0);
        assert_eq!(evo.layout, LayoutKind::Trimmed);
        assert_eq!(sim.max_ticks, 500);
        assert_eq!(sim.levels, LevelSet::Standard);
        assert!(!sim.lookup);
        evo.validate().expect("zero elites is allowed");
    }

    #[test]
    fn invalid_combinations_are_rejected() {
        let too_many_elites = EvolutionConfig {
            population: 4,
            elites: 5,
            ..EvolutionConfig::default()
        };
        assert!(too_many_elites.validate().is_err());

        let lonely = EvolutionConfig {
            population: 1,
            elites: 1,
            ..EvolutionConfig::default()
        };
        assert!(lonely.validate().is_err());

        let wild = EvolutionConfig {
            mutation: MutationParams {
                rate: 1.5,
                scale: 0.1,
            },
            ..EvolutionConfig::default()
        };
        assert!(wild.validate().is_err());

        let no_workers = EvolutionConfig {
            jobs: Some(0),
            ..EvolutionConfig::default()
        };
        assert!(no_workers.validate().is_err());

        let stopped = SimulationConfig {
            max_ticks: 0,
            ..SimulationConfig::default()
        };
        assert!(stopped.validate().is_err());
    }
}
