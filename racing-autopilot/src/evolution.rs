use crate::config::{EvolutionConfig, SimulationConfig};
use crate::runner::build_vehicle;
use crate::storage::{read_individuals, save_individuals};
use crate::util::{now_unix_s, seed_to_hex};
use anyhow::{anyhow, Context, Result};
use racing_core::genetic::{generate_offspring, random_individual, repair, select_elites};
use racing_core::{GeneLayout, Genome, Track, Vehicle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;

#[derive(Clone, Debug, Serialize)]
pub struct GenerationReport {
    pub generation: u32,
    pub tick_budget: u32,
    pub ticks_run: u32,
    pub vehicles: usize,
    pub skipped: usize,
    pub best_fitness: u32,
    pub mean_fitness: f64,
    pub survivors: usize,
    pub fitness: Vec<u32>,
    pub elites: Vec<Genome>,
    pub elapsed_ms: u64,
    pub generated_unix_s: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerationRow {
    pub generation: u32,
    pub tick_budget: u32,
    pub ticks_run: u32,
    pub vehicles: usize,
    pub skipped: usize,
    pub best_fitness: u32,
    pub mean_fitness: f64,
    pub survivors: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrainingSummary {
    pub generations: u32,
    pub population: usize,
    pub elites: usize,
    pub random_quota: usize,
    pub layout: String,
    pub seed_hex: String,
    pub elite_path: String,
    pub out_dir: String,
    pub best_fitness: u32,
    pub best_generation: Option<u32>,
    pub best_genome: Option<Genome>,
    pub elapsed_ms: u64,
    pub generated_unix_s: u64,
    pub history: Vec<GenerationRow>,
}

/// One raced individual.
struct Racer {
    genome: Genome,
    vehicle: Vehicle,
}

/// Outcome of racing one generation.
#[derive(Clone, Debug)]
pub struct GenerationRun {
    /// Raced genomes with their fitness, in population order.
    pub ranked: Vec<(Genome, u32)>,
    pub ticks_run: u32,
    pub skipped: usize,
    pub survivors: usize,
}

fn fresh_individual(layout: &GeneLayout, rng: &mut impl Rng) -> Result<Genome> {
    repair(&random_individual(layout, rng), layout).context("failed to repair random individual")
}

/// Stored elites that fit `layout`, topped up with repaired random
/// individuals to a full generation.
pub fn initial_population(
    stored: Vec<Genome>,
    evo: &EvolutionConfig,
    layout: &GeneLayout,
    rng: &mut impl Rng,
) -> Result<Vec<Genome>> {
    let target = evo.vehicles_per_generation();
    let mut population = Vec::with_capacity(target);

    for (index, genome) in stored.into_iter().enumerate() {
        if population.len() == evo.population {
            break;
        }
        match repair(&genome, layout) {
            Ok(repaired) => population.push(repaired),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping stored individual");
            }
        }
    }
    let seeded = population.len();

    while population.len() < target {
        population.push(fresh_individual(layout, rng)?);
    }

    tracing::info!(
        seeded,
        random = target - seeded,
        "initial population ready"
    );
    Ok(population)
}

/// Race every genome on `track` for at most `budget` ticks.
///
/// Vehicles advance in parallel, one tick at a time; all of them finish tick
/// `t` before any starts tick `t + 1`. Genomes that do not decode into a
/// controller are skipped with a warning.
pub fn run_generation(
    sim: &SimulationConfig,
    track: &Track,
    population: &[Genome],
    budget: u32,
) -> GenerationRun {
    let mut skipped = 0usize;
    let mut racers = Vec::with_capacity(population.len());
    for (index, genome) in population.iter().enumerate() {
        match build_vehicle(genome, sim) {
            Ok(vehicle) => racers.push(Racer {
                genome: genome.clone(),
                vehicle,
            }),
            Err(err) => {
                skipped += 1;
                tracing::warn!(index, error = %err, "skipping malformed genome");
            }
        }
    }

    let mut ticks_run = 0u32;
    while ticks_run < budget && racers.iter().any(|racer| racer.vehicle.is_alive()) {
        racers.par_iter_mut().for_each(|racer| {
            racer.vehicle.update(track);
        });
        ticks_run += 1;
    }

    let survivors = racers.iter().filter(|racer| racer.vehicle.is_alive()).count();
    let ranked = racers
        .into_iter()
        .map(|racer| {
            let fitness = racer.vehicle.fitness();
            (racer.genome, fitness)
        })
        .collect();

    GenerationRun {
        ranked,
        ticks_run,
        skipped,
        survivors,
    }
}

/// Elites of `ranked` and the next generation bred from them.
///
/// The next generation is the elites, `population - elites` offspring and
/// `random_quota` fresh individuals. With fewer than two elites the parent
/// pool is filled with fresh individuals.
pub fn breed_next(
    ranked: &[(Genome, u32)],
    evo: &EvolutionConfig,
    layout: &GeneLayout,
    rng: &mut impl Rng,
) -> Result<(Vec<Genome>, Vec<Genome>)> {
    let elites = select_elites(ranked, evo.elites);

    let mut parents = elites.clone();
    if parents.len() < 2 {
        tracing::warn!(
            elites = elites.len(),
            "not enough distinct elites to breed, adding random parents"
        );
        while parents.len() < 2 {
            parents.push(fresh_individual(layout, rng)?);
        }
    }

    let offspring_count = evo.population.saturating_sub(elites.len());
    let offspring = generate_offspring(&parents, offspring_count, layout, evo.mutation, rng)
        .context("failed to breed offspring")?;

    let mut next = Vec::with_capacity(evo.vehicles_per_generation());
    next.extend(elites.iter().cloned());
    next.extend(offspring);
    for _ in 0..evo.random_quota {
        next.push(fresh_individual(layout, rng)?);
    }
    Ok((elites, next))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(
        path,
        serde_json::to_vec_pretty(value).context("failed to serialize report json")?,
    )
    .with_context(|| format!("failed writing {}", path.display()))
}

fn write_generations_csv(path: &Path, rows: &[GenerationRow]) -> Result<()> {
    let mut csv = String::from(
        "generation,tick_budget,ticks_run,vehicles,skipped,best_fitness,mean_fitness,survivors\n",
    );
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{:.4},{}\n",
            row.generation,
            row.tick_budget,
            row.ticks_run,
            row.vehicles,
            row.skipped,
            row.best_fitness,
            row.mean_fitness,
            row.survivors
        ));
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}

/// Evolve controllers on `track`, persisting the elites after every
/// generation and a report per generation under `evo.out_dir`.
pub fn run_training(
    sim: &SimulationConfig,
    evo: &EvolutionConfig,
    track: &Track,
) -> Result<TrainingSummary> {
    evo.validate()?;
    if let Some(jobs) = evo.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| train(sim, evo, track))
    } else {
        train(sim, evo, track)
    }
}

fn train(sim: &SimulationConfig, evo: &EvolutionConfig, track: &Track) -> Result<TrainingSummary> {
    let started = Instant::now();
    let layout = evo.layout.layout();
    let mut rng = StdRng::seed_from_u64(evo.seed);

    fs::create_dir_all(&evo.out_dir)
        .with_context(|| format!("failed creating {}", evo.out_dir.display()))?;

    let stored = read_individuals(&sim.elite_path)?;
    let mut population = initial_population(stored, evo, &layout, &mut rng)?;

    let mut history = Vec::with_capacity(evo.generations as usize);
    let mut best: Option<(u32, u32, Genome)> = None;

    for generation in 0..evo.generations {
        let gen_started = Instant::now();
        let budget = evo.tick_budget(generation);
        tracing::info!(
            generation,
            vehicles = population.len(),
            budget,
            "generation start"
        );
        let run = run_generation(sim, track, &population, budget);
        if run.ranked.is_empty() {
            return Err(anyhow!(
                "generation {generation} has no raceable individuals"
            ));
        }

        let fitness: Vec<u32> = run.ranked.iter().map(|(_, fitness)| *fitness).collect();
        let best_fitness = fitness.iter().copied().max().unwrap_or(0);
        let mean_fitness =
            fitness.iter().map(|value| f64::from(*value)).sum::<f64>() / fitness.len() as f64;

        let (elites, next) = breed_next(&run.ranked, evo, &layout, &mut rng)?;
        if elites.is_empty() {
            tracing::warn!(generation, "no elites selected, keeping the stored file");
        } else {
            save_individuals(&sim.elite_path, &elites)?;
        }

        if let Some(top) = elites.first() {
            let improved = best
                .as_ref()
                .map_or(true, |(fitness, _, _)| best_fitness > *fitness);
            if improved {
                best = Some((best_fitness, generation, top.clone()));
            }
        }

        let report = GenerationReport {
            generation,
            tick_budget: budget,
            ticks_run: run.ticks_run,
            vehicles: population.len(),
            skipped: run.skipped,
            best_fitness,
            mean_fitness,
            survivors: run.survivors,
            fitness,
            elites,
            elapsed_ms: gen_started.elapsed().as_millis() as u64,
            generated_unix_s: now_unix_s(),
        };
        let gen_dir = evo.out_dir.join(format!("gen-{generation}"));
        fs::create_dir_all(&gen_dir)
            .with_context(|| format!("failed creating {}", gen_dir.display()))?;
        write_json(&gen_dir.join("report.json"), &report)?;

        tracing::info!(
            generation,
            budget,
            ticks = run.ticks_run,
            best = best_fitness,
            mean = mean_fitness,
            survivors = run.survivors,
            elites = report.elites.len(),
            "generation complete"
        );

        history.push(GenerationRow {
            generation,
            tick_budget: budget,
            ticks_run: run.ticks_run,
            vehicles: report.vehicles,
            skipped: run.skipped,
            best_fitness,
            mean_fitness,
            survivors: run.survivors,
        });
        population = next;
    }

    let (best_fitness, best_generation, best_genome) = match best {
        Some((fitness, generation, genome)) => (fitness, Some(generation), Some(genome)),
        None => (0, None, None),
    };

    let summary = TrainingSummary {
        generations: evo.generations,
        population: evo.population,
        elites: evo.elites,
        random_quota: evo.random_quota,
        layout: evo.layout.as_str().to_string(),
        seed_hex: seed_to_hex(evo.seed),
        elite_path: display(&sim.elite_path),
        out_dir: display(&evo.out_dir),
        best_fitness,
        best_generation,
        best_genome,
        elapsed_ms: started.elapsed().as_millis() as u64,
        generated_unix_s: now_unix_s(),
        history,
    };

    write_generations_csv(&evo.out_dir.join("generations.csv"), &summary.history)?;
    write_json(&evo.out_dir.join("summary.json"), &summary)?;
    Ok(summary)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use racing_core::constants::REFERENCE_GENOME;

    fn small_config() -> EvolutionConfig {
        EvolutionConfig {
            population: 4,
            elites: 2,
            random_quota: 1,
            ..EvolutionConfig::default()
        }
    }

    #[test]
    fn initial_population_keeps_fitting_elites_first() -> Result<()> {
        let evo = small_config();
        let layout = GeneLayout::trimmed();
        let mut rng = StdRng::seed_from_u64(3);
        let stored = vec![REFERENCE_GENOME.to_vec(), vec![0.5; 12]];

        let population = initial_population(stored, &evo, &layout, &mut rng)?;
        assert_eq!(population.len(), evo.vehicles_per_generation());
        assert_eq!(population[0], REFERENCE_GENOME.to_vec());
        assert!(population.iter().all(|g| g.len() == layout.gene_count()));
        Ok(())
    }

    #[test]
    fn breeding_keeps_elites_and_fills_the_generation() -> Result<()> {
        let evo = small_config();
        let layout = GeneLayout::trimmed();
        let mut rng = StdRng::seed_from_u64(11);
        let a = REFERENCE_GENOME.to_vec();
        let b = fresh_individual(&layout, &mut rng)?;
        let c = fresh_individual(&layout, &mut rng)?;
        let ranked = vec![(c.clone(), 1), (a.clone(), 5), (b.clone(), 3)];

        let (elites, next) = breed_next(&ranked, &evo, &layout, &mut rng)?;
        assert_eq!(elites, vec![a, b]);
        assert_eq!(next.len(), evo.vehicles_per_generation());
        assert_eq!(&next[..2], &elites[..]);
        Ok(())
    }

    #[test]
    fn single_survivor_still_breeds() -> Result<()> {
        let evo = small_config();
        let layout = GeneLayout::trimmed();
        let mut rng = StdRng::seed_from_u64(5);
        let genome = REFERENCE_GENOME.to_vec();
        let ranked = vec![(genome.clone(), 0), (genome.clone(), 0)];

        let (elites, next) = breed_next(&ranked, &evo, &layout, &mut rng)?;
        assert_eq!(elites.len(), 1);
        assert_eq!(next.len(), evo.vehicles_per_generation());
        Ok(())
    }

    #[test]
    fn malformed_genomes_are_skipped() {
        let sim = SimulationConfig::default();
        let track = Track::reference();
        let population = vec![REFERENCE_GENOME.to_vec(), vec![1.0; 3]];

        let run = run_generation(&sim, &track, &population, 5);
        assert_eq!(run.skipped, 1);
        assert_eq!(run.ranked.len(), 1);
        assert!(run.ticks_run <= 5);
    }
}
