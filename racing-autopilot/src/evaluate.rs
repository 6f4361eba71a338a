use crate::config::SimulationConfig;
use crate::runner::{build_vehicle, run_vehicle, RunMetrics};
use crate::storage::read_individuals;
use crate::util::now_unix_s;
use anyhow::{anyhow, Context, Result};
use racing_core::{Genome, Track};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct EvaluateConfig {
    pub individuals_path: PathBuf,
    pub out_dir: PathBuf,
    pub jobs: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RankedIndividual {
    pub rank: usize,
    /// Line index in the individuals file.
    pub index: usize,
    pub genes: usize,
    pub metrics: Option<RunMetrics>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EvaluateReport {
    pub generated_unix_s: u64,
    pub individuals_path: String,
    pub max_ticks: u32,
    pub evaluated: usize,
    pub failed: usize,
    pub best_index: Option<usize>,
    pub best_fitness: u32,
    pub rankings: Vec<RankedIndividual>,
}

fn evaluate_one(sim: &SimulationConfig, track: &Track, index: usize, genome: &Genome) -> RankedIndividual {
    let (metrics, error) = match build_vehicle(genome, sim) {
        Ok(mut vehicle) => (
            Some(run_vehicle(&mut vehicle, track, sim.max_ticks, "fuzzy")),
            None,
        ),
        Err(err) => (None, Some(err.to_string())),
    };
    RankedIndividual {
        rank: 0,
        index,
        genes: genome.len(),
        metrics,
        error,
    }
}

/// Race every stored individual once and rank them by fitness, then distance.
pub fn run_evaluate(
    sim: &SimulationConfig,
    track: &Track,
    config: &EvaluateConfig,
) -> Result<EvaluateReport> {
    if sim.max_ticks == 0 {
        return Err(anyhow!("max_ticks must be > 0"));
    }
    let individuals = read_individuals(&config.individuals_path)?;
    if individuals.is_empty() {
        return Err(anyhow!(
            "no individuals found in {}",
            config.individuals_path.display()
        ));
    }
    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("failed creating {}", config.out_dir.display()))?;

    let run_one = |(index, genome): (usize, &Genome)| evaluate_one(sim, track, index, genome);
    let mut rankings: Vec<RankedIndividual> = if let Some(jobs) = config.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| individuals.par_iter().enumerate().map(run_one).collect())
    } else {
        individuals.par_iter().enumerate().map(run_one).collect()
    };

    rankings.sort_by(|a, b| match (&a.metrics, &b.metrics) {
        (Some(x), Some(y)) => y
            .fitness
            .cmp(&x.fitness)
            .then_with(|| y.distance.total_cmp(&x.distance))
            .then_with(|| a.index.cmp(&b.index)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.index.cmp(&b.index),
    });
    for (rank, row) in rankings.iter_mut().enumerate() {
        row.rank = rank + 1;
    }

    let failed = rankings.iter().filter(|row| row.metrics.is_none()).count();
    let best = rankings.first().and_then(|row| row.metrics.as_ref().map(|m| (row.index, m.fitness)));
    for row in rankings.iter().filter(|row| row.error.is_some()) {
        tracing::warn!(index = row.index, error = ?row.error, "individual did not decode");
    }

    let report = EvaluateReport {
        generated_unix_s: now_unix_s(),
        individuals_path: config.individuals_path.display().to_string(),
        max_ticks: sim.max_ticks,
        evaluated: rankings.len() - failed,
        failed,
        best_index: best.map(|(index, _)| index),
        best_fitness: best.map_or(0, |(_, fitness)| fitness),
        rankings,
    };

    write_rankings_csv(&config.out_dir.join("rankings.csv"), &report.rankings)?;
    let report_path = config.out_dir.join("summary.json");
    fs::write(
        &report_path,
        serde_json::to_vec_pretty(&report).context("failed to serialize summary json")?,
    )
    .with_context(|| format!("failed writing {}", report_path.display()))?;

    Ok(report)
}

fn write_rankings_csv(path: &Path, rows: &[RankedIndividual]) -> Result<()> {
    let mut csv = String::from(
        "rank,index,genes,fitness,next_checkpoint,ticks,distance,alive,death_cause,error\n",
    );
    for row in rows {
        match &row.metrics {
            Some(m) => csv.push_str(&format!(
                "{},{},{},{},{},{},{:.2},{},{},\n",
                row.rank,
                row.index,
                row.genes,
                m.fitness,
                m.next_checkpoint,
                m.ticks,
                m.distance,
                m.alive,
                m.death_cause.as_deref().unwrap_or("")
            )),
            None => csv.push_str(&format!(
                "{},{},{},,,,,,,{}\n",
                row.rank,
                row.index,
                row.genes,
                row.error.as_deref().unwrap_or("").replace(',', ";")
            )),
        }
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}
