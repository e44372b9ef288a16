//! Genetic search over piece orderings and rotation choices. Each chromosome
//! is decoded by [`pack_genes`] and scored on waste, unplaced pieces and
//! sheet count; the evolutionary loop runs once per split rule.

use crate::guillotine::SplitRule;
use crate::packing::{Packing, pack_genes};
use crate::types::{Gene, Part, PartInstance, SheetSpec};
use rand::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Weight applied to the area of every piece left unplaced. Large enough
/// that dropping a piece always costs more than any amount of waste.
pub const LEFTOVER_PENALTY: u64 = 1000;

/// Weight applied per sheet, nudging equal-waste packings toward fewer boards.
pub const SHEET_PENALTY: u64 = 100;

/// Stopping condition for one evolutionary run. `Time` is the production
/// mode; `Generations` makes runs reproducible for tests.
#[derive(Debug, Clone, Copy)]
pub enum Budget {
    Time(Duration),
    Generations(u32),
}

impl Budget {
    fn exhausted(&self, started: Instant, generation: u32) -> bool {
        match *self {
            Budget::Time(limit) => started.elapsed() >= limit,
            Budget::Generations(limit) => generation >= limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GaConfig {
    pub population_size: usize,
    pub tournament_size: usize,
    pub mutation_rate: f64,
    pub elite_fraction: f64,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 60,
            tournament_size: 3,
            mutation_rate: 0.2,
            elite_fraction: 0.1,
        }
    }
}

impl GaConfig {
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    pub fn with_tournament_size(mut self, size: usize) -> Self {
        self.tournament_size = size.max(1);
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_elite_fraction(mut self, fraction: f64) -> Self {
        self.elite_fraction = fraction.clamp(0.0, 1.0);
        self
    }
}

/// One candidate full-ensemble packing: a placement order plus a rotation
/// decision per instance. Always fully evaluated before comparison.
#[derive(Debug, Clone)]
pub struct Chromosome {
    pub genes: Vec<Gene>,
    pub fitness: u64,
    pub sheet_count: usize,
    pub efficiency_percent: f64,
}

impl Chromosome {
    fn unevaluated(genes: Vec<Gene>) -> Self {
        Self {
            genes,
            fitness: u64::MAX,
            sheet_count: 0,
            efficiency_percent: 0.0,
        }
    }
}

/// Scalar score of a packing; lower is better. Unplaced pieces dominate,
/// then sheet count, then waste.
pub fn fitness_of(
    packing: &Packing,
    parts: &[Part],
    instances: &[PartInstance],
    spec: &SheetSpec,
) -> u64 {
    packing.waste_area(spec)
        + packing.leftover_area(parts, instances) * LEFTOVER_PENALTY
        + packing.sheet_count() as u64 * SHEET_PENALTY
}

fn evaluate(
    chromosome: &mut Chromosome,
    parts: &[Part],
    instances: &[PartInstance],
    spec: &SheetSpec,
    rule: SplitRule,
) {
    // Sheets are rebuilt from scratch and dropped right after scoring; the
    // winning chromosome is re-packed once at the end of the run.
    let packing = pack_genes(&chromosome.genes, parts, instances, spec, rule);
    chromosome.fitness = fitness_of(&packing, parts, instances, spec);
    chromosome.sheet_count = packing.sheet_count();
    chromosome.efficiency_percent = packing.efficiency_percent(spec);
}

fn genes_from_order<R: Rng>(
    order: Vec<usize>,
    parts: &[Part],
    instances: &[PartInstance],
    rng: &mut R,
) -> Vec<Gene> {
    order
        .into_iter()
        .map(|instance| Gene {
            instance,
            rotated: parts[instances[instance].part].rotation_allowed && rng.gen_bool(0.5),
        })
        .collect()
}

/// Mixes deterministic orderings (largest-area, largest-perimeter, most
/// elongated first) with random shuffles, so the obvious heuristics are
/// always represented in the starting population.
pub fn seed_population<R: Rng>(
    parts: &[Part],
    instances: &[PartInstance],
    size: usize,
    rng: &mut R,
) -> Vec<Chromosome> {
    let n = instances.len();
    let rect = |i: usize| parts[instances[i].part].rect();

    let mut by_area: Vec<usize> = (0..n).collect();
    by_area.sort_by(|&a, &b| rect(b).area().cmp(&rect(a).area()));

    let mut by_perimeter: Vec<usize> = (0..n).collect();
    by_perimeter.sort_by(|&a, &b| rect(b).perimeter().cmp(&rect(a).perimeter()));

    let mut by_aspect: Vec<usize> = (0..n).collect();
    by_aspect.sort_by(|&a, &b| {
        rect(b)
            .aspect_ratio()
            .partial_cmp(&rect(a).aspect_ratio())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut population = Vec::with_capacity(size);
    for order in [by_area, by_perimeter, by_aspect] {
        if population.len() >= size {
            break;
        }
        population.push(Chromosome::unevaluated(genes_from_order(
            order, parts, instances, rng,
        )));
    }
    while population.len() < size {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);
        population.push(Chromosome::unevaluated(genes_from_order(
            order, parts, instances, rng,
        )));
    }
    population
}

/// Single-point order crossover. The child takes parent A's prefix, then
/// parent B's genes in B's order skipping already-used instances, then
/// whatever A's remainder still misses: always a permutation of the full
/// instance set.
pub fn crossover<R: Rng>(a: &Chromosome, b: &Chromosome, rng: &mut R) -> Vec<Gene> {
    let n = a.genes.len();
    if n < 2 {
        return a.genes.clone();
    }
    let cut = rng.gen_range(1..n);

    let mut used = vec![false; n];
    let mut child = Vec::with_capacity(n);
    for gene in &a.genes[..cut] {
        child.push(*gene);
        used[gene.instance] = true;
    }
    for gene in &b.genes {
        if !used[gene.instance] {
            child.push(*gene);
            used[gene.instance] = true;
        }
    }
    for gene in &a.genes[cut..] {
        if !used[gene.instance] {
            child.push(*gene);
            used[gene.instance] = true;
        }
    }
    child
}

/// Applies the three mutation operators, each with its own independent roll:
/// position swap, rotation flip (respecting rotation locks), and
/// subsequence reversal at half the base rate.
pub fn mutate<R: Rng>(
    genes: &mut [Gene],
    parts: &[Part],
    instances: &[PartInstance],
    rate: f64,
    rng: &mut R,
) {
    let n = genes.len();
    if n == 0 {
        return;
    }
    if rng.gen_range(0.0..1.0) < rate && n >= 2 {
        let i = rng.gen_range(0..n);
        let j = rng.gen_range(0..n);
        genes.swap(i, j);
    }
    if rng.gen_range(0.0..1.0) < rate {
        let i = rng.gen_range(0..n);
        if parts[instances[genes[i].instance].part].rotation_allowed {
            genes[i].rotated = !genes[i].rotated;
        }
    }
    if rng.gen_range(0.0..1.0) < rate / 2.0 && n >= 2 {
        let (mut p1, mut p2) = (rng.gen_range(0..n), rng.gen_range(0..n));
        if p1 > p2 {
            std::mem::swap(&mut p1, &mut p2);
        }
        genes[p1..=p2].reverse();
    }
}

fn tournament<'a, R: Rng>(
    population: &'a [Chromosome],
    size: usize,
    rng: &mut R,
) -> &'a Chromosome {
    let mut best = &population[rng.gen_range(0..population.len())];
    for _ in 1..size {
        let candidate = &population[rng.gen_range(0..population.len())];
        if candidate.fitness < best.fitness {
            best = candidate;
        }
    }
    best
}

/// Generational loop for one split rule: elitist carry-over, tournament
/// selection, crossover and mutation until the budget runs out or the
/// cancellation flag is raised. Returns the best chromosome ever seen.
pub fn evolve<R: Rng>(
    parts: &[Part],
    instances: &[PartInstance],
    spec: &SheetSpec,
    rule: SplitRule,
    budget: Budget,
    config: &GaConfig,
    rng: &mut R,
    cancel: &AtomicBool,
) -> Chromosome {
    let started = Instant::now();

    let size = config.population_size.max(2);
    let mut population = seed_population(parts, instances, size, rng);
    for chromosome in &mut population {
        evaluate(chromosome, parts, instances, spec, rule);
    }
    population.sort_by_key(|c| c.fitness);

    let mut best = population[0].clone();
    let elite_count = ((population.len() as f64 * config.elite_fraction).ceil() as usize)
        .clamp(1, population.len());

    let mut generation = 0u32;
    while !budget.exhausted(started, generation) && !cancel.load(Ordering::Relaxed) {
        let mut next: Vec<Chromosome> = population.iter().take(elite_count).cloned().collect();
        while next.len() < population.len() {
            let parent_a = tournament(&population, config.tournament_size, rng);
            let parent_b = tournament(&population, config.tournament_size, rng);
            let mut genes = crossover(parent_a, parent_b, rng);
            mutate(&mut genes, parts, instances, config.mutation_rate, rng);
            let mut child = Chromosome::unevaluated(genes);
            evaluate(&mut child, parts, instances, spec, rule);
            next.push(child);
        }
        next.sort_by_key(|c| c.fitness);
        if next[0].fitness < best.fitness {
            best = next[0].clone();
        }
        population = next;
        generation += 1;
        tracing::debug!(
            rule = rule.name(),
            generation,
            best_fitness = best.fitness,
            "generation complete"
        );
    }

    tracing::debug!(
        rule = rule.name(),
        generations = generation,
        fitness = best.fitness,
        sheets = best.sheet_count,
        "evolution finished"
    );
    best
}
