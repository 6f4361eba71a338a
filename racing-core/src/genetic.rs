//! Genetic operators over fuzzy membership genomes.
//!
//! A genome is a flat list of triangle breakpoints, three genes per term and
//! one block of terms per fuzzy variable. The layout says how many terms each
//! block has, which genes are pinned to the domain edges and the per-gene
//! bounds that mutation clamps to.

use rand::seq::index::sample;
use rand::Rng;

use crate::constants::{
    ACCELERATION_LEVELS, DEFAULT_MUTATION_RATE, DEFAULT_MUTATION_SCALE, FRONT_DOMAIN,
    GENES_PER_TERM, ROTATION_LEVELS, SIDE_DOMAIN, SPEED_DOMAIN, TERMS_PER_VARIABLE,
    TRIMMED_FIXED_INDICES,
};
use crate::error::GeneticError;

pub type Genome = Vec<f64>;

#[derive(Clone, Debug, PartialEq)]
pub struct GeneLayout {
    structure: Vec<usize>,
    domains: Vec<(f64, f64)>,
    fixed: Vec<bool>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl GeneLayout {
    /// `structure[v]` is the number of terms of variable `v`, `domains[v]` its
    /// range. Fixed genes are pinned to the domain minimum in the first half
    /// of their block and to the maximum in the second half.
    pub fn new(
        structure: Vec<usize>,
        domains: Vec<(f64, f64)>,
        fixed_indices: &[usize],
    ) -> Result<Self, GeneticError> {
        if structure.len() != domains.len() {
            return Err(GeneticError::LayoutMismatch {
                structure: structure.len(),
                domains: domains.len(),
            });
        }

        let gene_count: usize = structure.iter().map(|terms| terms * GENES_PER_TERM).sum();
        if let Some(&index) = fixed_indices.iter().find(|index| **index >= gene_count) {
            return Err(GeneticError::FixedIndexOutOfRange { index, gene_count });
        }

        Ok(Self::from_parts(structure, domains, fixed_indices.to_vec()))
    }

    /// 45 genes: speed, front and a shared side-distance block.
    pub fn trimmed() -> Self {
        Self::from_parts(
            vec![TERMS_PER_VARIABLE; 3],
            vec![SPEED_DOMAIN, FRONT_DOMAIN, SIDE_DOMAIN],
            TRIMMED_FIXED_INDICES.to_vec(),
        )
    }

    /// 90 genes: all four inputs plus acceleration and rotation.
    pub fn full() -> Self {
        let domains = vec![
            SPEED_DOMAIN,
            FRONT_DOMAIN,
            SIDE_DOMAIN,
            SIDE_DOMAIN,
            (ACCELERATION_LEVELS[0], ACCELERATION_LEVELS[4]),
            (ROTATION_LEVELS[0], ROTATION_LEVELS[4]),
        ];
        let block = TERMS_PER_VARIABLE * GENES_PER_TERM;
        let fixed = (0..domains.len())
            .flat_map(|v| {
                let start = v * block;
                [start, start + 1, start + block - 2, start + block - 1]
            })
            .collect();
        Self::from_parts(vec![TERMS_PER_VARIABLE; domains.len()], domains, fixed)
    }

    fn from_parts(structure: Vec<usize>, domains: Vec<(f64, f64)>, fixed: Vec<usize>) -> Self {
        let gene_count: usize = structure.iter().map(|terms| terms * GENES_PER_TERM).sum();
        let mut mask = vec![false; gene_count];
        for index in fixed {
            if let Some(slot) = mask.get_mut(index) {
                *slot = true;
            }
        }
        let mut layout = Self {
            structure,
            domains,
            fixed: mask,
            lower: Vec::new(),
            upper: Vec::new(),
        };
        for (terms, (low, high)) in layout.structure.iter().zip(&layout.domains) {
            layout
                .lower
                .extend(std::iter::repeat(*low).take(terms * GENES_PER_TERM));
            layout
                .upper
                .extend(std::iter::repeat(*high).take(terms * GENES_PER_TERM));
        }
        layout
    }

    pub fn gene_count(&self) -> usize {
        self.fixed.len()
    }

    pub fn is_fixed(&self, index: usize) -> bool {
        self.fixed.get(index).copied().unwrap_or(false)
    }

    pub fn fixed_indices(&self) -> Vec<usize> {
        (0..self.fixed.len()).filter(|i| self.fixed[*i]).collect()
    }

    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    /// Gene ranges of each variable block together with its domain.
    fn blocks(&self) -> impl Iterator<Item = (std::ops::Range<usize>, (f64, f64))> + '_ {
        let mut start = 0;
        self.structure
            .iter()
            .zip(&self.domains)
            .map(move |(terms, domain)| {
                let range = start..start + terms * GENES_PER_TERM;
                start = range.end;
                (range, *domain)
            })
    }

    fn check_len(&self, genome: &[f64]) -> Result<(), GeneticError> {
        if genome.len() == self.gene_count() {
            Ok(())
        } else {
            Err(GeneticError::LengthMismatch {
                expected: self.gene_count(),
                actual: genome.len(),
            })
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MutationParams {
    /// Per-gene probability of a perturbation.
    pub rate: f64,
    /// Offset range as a fraction of the parents' disagreement on that gene.
    pub scale: f64,
}

impl Default for MutationParams {
    fn default() -> Self {
        Self {
            rate: DEFAULT_MUTATION_RATE,
            scale: DEFAULT_MUTATION_SCALE,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Uniform genes per block, rounded to two decimals, with fixed genes pinned
/// to the domain edges. The result is not repaired.
pub fn random_individual(layout: &GeneLayout, rng: &mut impl Rng) -> Genome {
    let mut genome = Vec::with_capacity(layout.gene_count());
    for (range, (low, high)) in layout.blocks() {
        let midpoint = range.start + range.len() / 2;
        for index in range {
            let gene = if layout.is_fixed(index) {
                if index < midpoint {
                    low
                } else {
                    high
                }
            } else if high > low {
                round2(rng.gen_range(low..=high)).clamp(low, high)
            } else {
                low
            };
            genome.push(gene);
        }
    }
    genome
}

/// Restore the membership invariants of every block.
///
/// The last gene of each term is swapped with the first gene of the next term,
/// the non-fixed genes of the block are sorted in that view, and the swap is
/// undone. Sorting in the swapped view leaves neighbouring triangles
/// overlapping (`next.a <= prev.c`). Each triangle is then ordered using its
/// non-fixed slots only. Non-fixed genes are clamped into the layout bounds
/// first; fixed genes are never touched.
pub fn repair(genome: &[f64], layout: &GeneLayout) -> Result<Genome, GeneticError> {
    layout.check_len(genome)?;
    let mut repaired = genome.to_vec();

    for (index, gene) in repaired.iter_mut().enumerate() {
        if !layout.is_fixed(index) {
            *gene = gene.clamp(layout.lower[index], layout.upper[index]);
        }
    }

    for (range, _) in layout.blocks() {
        let mut view: Vec<usize> = range.clone().collect();
        let terms = range.len() / GENES_PER_TERM;
        for term in 1..terms {
            let boundary = term * GENES_PER_TERM - 1;
            view.swap(boundary, boundary + 1);
        }

        let sortable: Vec<usize> = view
            .into_iter()
            .filter(|index| !layout.is_fixed(*index))
            .collect();
        let mut values: Vec<f64> = sortable.iter().map(|index| repaired[*index]).collect();
        values.sort_by(f64::total_cmp);
        for (index, value) in sortable.iter().zip(values) {
            repaired[*index] = value;
        }

        for term in 0..terms {
            let start = range.start + term * GENES_PER_TERM;
            order_triangle(&mut repaired, start, layout);
        }
    }

    Ok(repaired)
}

fn order_triangle(genome: &mut [f64], start: usize, layout: &GeneLayout) {
    let triple = &genome[start..start + GENES_PER_TERM];
    if triple[0] <= triple[1] && triple[1] <= triple[2] {
        return;
    }
    let slots: Vec<usize> = (start..start + GENES_PER_TERM)
        .filter(|index| !layout.is_fixed(*index))
        .collect();
    let mut values: Vec<f64> = slots.iter().map(|index| genome[*index]).collect();
    values.sort_by(f64::total_cmp);
    for (index, value) in slots.into_iter().zip(values) {
        genome[index] = value;
    }
}

/// Two-point crossover: `first[..a] + second[a..b] + first[b..]` for two
/// distinct cut points `a < b`.
pub fn crossover(first: &[f64], second: &[f64], rng: &mut impl Rng) -> Result<Genome, GeneticError> {
    if first.len() != second.len() {
        return Err(GeneticError::LengthMismatch {
            expected: first.len(),
            actual: second.len(),
        });
    }
    if first.len() < 2 {
        return Ok(first.to_vec());
    }

    let cuts = sample(rng, first.len(), 2);
    let (a, b) = {
        let (x, y) = (cuts.index(0), cuts.index(1));
        (x.min(y), x.max(y))
    };

    let mut child = Vec::with_capacity(first.len());
    child.extend_from_slice(&first[..a]);
    child.extend_from_slice(&second[a..b]);
    child.extend_from_slice(&first[b..]);
    Ok(child)
}

/// Perturb non-fixed genes with probability `params.rate`. The offset is
/// uniform in `[-scale, scale]` times how far the parents disagree on that
/// gene, and the result is clamped to the gene bounds.
pub fn mutate(
    child: &mut [f64],
    parents: (&[f64], &[f64]),
    layout: &GeneLayout,
    params: MutationParams,
    rng: &mut impl Rng,
) {
    let (first, second) = parents;
    for index in 0..child.len().min(layout.gene_count()) {
        if layout.is_fixed(index) || rng.gen::<f64>() >= params.rate {
            continue;
        }
        let spread = (first[index] - second[index]).abs();
        let factor = if params.scale > 0.0 {
            rng.gen_range(-params.scale..=params.scale)
        } else {
            0.0
        };
        child[index] =
            (child[index] + factor * spread).clamp(layout.lower[index], layout.upper[index]);
    }
}

/// Breed `count` repaired children from random distinct parent pairs.
pub fn generate_offspring(
    population: &[Genome],
    count: usize,
    layout: &GeneLayout,
    params: MutationParams,
    rng: &mut impl Rng,
) -> Result<Vec<Genome>, GeneticError> {
    if population.len() < 2 {
        return Err(GeneticError::TooFewParents {
            available: population.len(),
        });
    }
    for parent in population {
        layout.check_len(parent)?;
    }

    let mut offspring = Vec::with_capacity(count);
    for _ in 0..count {
        let pair = sample(rng, population.len(), 2);
        let first = &population[pair.index(0)];
        let second = &population[pair.index(1)];

        let mut child = crossover(first, second, rng)?;
        mutate(&mut child, (first, second), layout, params, rng);
        offspring.push(repair(&child, layout)?);
    }
    Ok(offspring)
}

/// Top `count` distinct genomes by fitness, best first. Equal fitness keeps
/// the input order.
pub fn select_elites(ranked: &[(Genome, u32)], count: usize) -> Vec<Genome> {
    let mut order: Vec<&(Genome, u32)> = ranked.iter().collect();
    order.sort_by(|a, b| b.1.cmp(&a.1));

    let mut elites: Vec<Genome> = Vec::with_capacity(count);
    for (genome, _) in order {
        if elites.len() == count {
            break;
        }
        if !elites.contains(genome) {
            elites.push(genome.clone());
        }
    }
    elites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REFERENCE_GENOME;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn trimmed_layout_shape() {
        let layout = GeneLayout::trimmed();
        assert_eq!(layout.gene_count(), 45);
        assert_eq!(layout.fixed_indices(), TRIMMED_FIXED_INDICES.to_vec());
        assert_eq!(layout.upper_bounds()[14], 2.0);
        assert_eq!(layout.upper_bounds()[15], 500.0);
        assert_eq!(layout.upper_bounds()[44], 300.0);
        assert!(layout.lower_bounds().iter().all(|b| *b == 0.0));
    }

    #[test]
    fn full_layout_pins_every_block() {
        let layout = GeneLayout::full();
        assert_eq!(layout.gene_count(), 90);
        assert_eq!(layout.fixed_indices().len(), 24);
        assert!(layout.is_fixed(75) && layout.is_fixed(76));
        assert!(layout.is_fixed(88) && layout.is_fixed(89));
        assert_eq!(layout.lower_bounds()[60], -2.0);
        assert_eq!(layout.upper_bounds()[89], 4.0);
    }

    #[test]
    fn layout_rejects_bad_configuration() {
        assert_eq!(
            GeneLayout::new(vec![5, 5], vec![SPEED_DOMAIN], &[]),
            Err(GeneticError::LayoutMismatch {
                structure: 2,
                domains: 1
            })
        );
        assert_eq!(
            GeneLayout::new(vec![5], vec![SPEED_DOMAIN], &[15]),
            Err(GeneticError::FixedIndexOutOfRange {
                index: 15,
                gene_count: 15
            })
        );
    }

    #[test]
    fn custom_layout_matches_trimmed() {
        let layout = GeneLayout::new(
            vec![5, 5, 5],
            vec![SPEED_DOMAIN, FRONT_DOMAIN, SIDE_DOMAIN],
            &TRIMMED_FIXED_INDICES,
        )
        .expect("valid layout");
        assert_eq!(layout, GeneLayout::trimmed());
    }

    #[test]
    fn random_individual_pins_domain_edges() {
        let layout = GeneLayout::trimmed();
        let mut rng = StdRng::seed_from_u64(7);
        let genome = random_individual(&layout, &mut rng);
        assert_eq!(genome.len(), 45);
        for (index, expected) in [
            (0, 0.0),
            (1, 0.0),
            (13, 2.0),
            (14, 2.0),
            (15, 0.0),
            (16, 0.0),
            (28, 500.0),
            (29, 500.0),
            (30, 0.0),
            (31, 0.0),
            (43, 300.0),
            (44, 300.0),
        ] {
            assert_eq!(genome[index], expected, "gene {index}");
        }
        for (index, gene) in genome.iter().enumerate() {
            assert!(*gene >= layout.lower_bounds()[index]);
            assert!(*gene <= layout.upper_bounds()[index]);
            assert!(((gene * 100.0).round() - gene * 100.0).abs() < 1e-6);
        }
    }

    #[test]
    fn repair_keeps_an_ordered_genome() {
        let layout = GeneLayout::trimmed();
        let repaired = repair(&REFERENCE_GENOME, &layout).expect("same length");
        assert_eq!(repaired, REFERENCE_GENOME.to_vec());
    }

    #[test]
    fn repair_sorts_and_restores_overlap() {
        let layout = GeneLayout::trimmed();
        let mut genome = REFERENCE_GENOME.to_vec();
        // scramble the interior of the speed block
        genome[2..13].reverse();
        let repaired = repair(&genome, &layout).expect("same length");

        for triple in repaired.chunks_exact(3) {
            assert!(triple[0] <= triple[1] && triple[1] <= triple[2], "{triple:?}");
        }
        for term in 1..5 {
            let prev_c = repaired[term * 3 - 1];
            let next_a = repaired[term * 3];
            assert!(next_a <= prev_c, "term {term} does not overlap");
        }
        for index in layout.fixed_indices() {
            assert_eq!(repaired[index], genome[index]);
        }
    }

    #[test]
    fn repair_rejects_wrong_length() {
        assert_eq!(
            repair(&[0.0; 10], &GeneLayout::trimmed()),
            Err(GeneticError::LengthMismatch {
                expected: 45,
                actual: 10
            })
        );
    }

    #[test]
    fn crossover_splices_one_segment() {
        let mut rng = StdRng::seed_from_u64(3);
        let first = vec![0.0; 20];
        let second = vec![1.0; 20];
        for _ in 0..50 {
            let child = crossover(&first, &second, &mut rng).expect("same length");
            assert_eq!(child.len(), 20);
            let start = child.iter().position(|g| *g == 1.0).expect("segment present");
            let end = start + child[start..].iter().take_while(|g| **g == 1.0).count();
            assert!(child[end..].iter().all(|g| *g == 0.0));
        }
    }

    #[test]
    fn mutation_respects_rate_fixed_genes_and_bounds() {
        let layout = GeneLayout::trimmed();
        let mut rng = StdRng::seed_from_u64(11);
        let low = vec![0.0; 45];
        let high: Vec<f64> = layout.upper_bounds().to_vec();

        let mut untouched = low.clone();
        let frozen = MutationParams {
            rate: 0.0,
            scale: 1.0,
        };
        mutate(&mut untouched, (&low, &high), &layout, frozen, &mut rng);
        assert_eq!(untouched, low);

        let wild = MutationParams {
            rate: 1.0,
            scale: 5.0,
        };
        let mut child = high.clone();
        child[0] = 0.5;
        mutate(&mut child, (&low, &high), &layout, wild, &mut rng);
        assert_eq!(child[0], 0.5, "fixed gene moved");
        for (index, gene) in child.iter().enumerate() {
            assert!(*gene >= layout.lower_bounds()[index]);
            assert!(*gene <= layout.upper_bounds()[index]);
        }

        let mut same = REFERENCE_GENOME.to_vec();
        mutate(
            &mut same,
            (&REFERENCE_GENOME, &REFERENCE_GENOME),
            &layout,
            wild,
            &mut rng,
        );
        assert_eq!(same, REFERENCE_GENOME.to_vec(), "identical parents have no spread");
    }

    #[test]
    fn offspring_needs_two_parents() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = generate_offspring(
            &[REFERENCE_GENOME.to_vec()],
            3,
            &GeneLayout::trimmed(),
            MutationParams::default(),
            &mut rng,
        );
        assert_eq!(result, Err(GeneticError::TooFewParents { available: 1 }));
    }

    #[test]
    fn elites_are_distinct_and_ranked() {
        let a = vec![1.0];
        let b = vec![2.0];
        let c = vec![3.0];
        let ranked = vec![
            (a.clone(), 2),
            (b.clone(), 5),
            (b.clone(), 5),
            (c.clone(), 2),
        ];
        assert_eq!(select_elites(&ranked, 3), vec![b.clone(), a, c]);
        assert_eq!(select_elites(&ranked, 1), vec![b]);
        assert!(select_elites(&[], 3).is_empty());
    }
}
