//! Outer optimization layer: races the genetic search (one run per split
//! rule) against the direct greedy packers, ranks every result and validates
//! piece conservation before anything is returned.

use crate::genetic::{self, Budget, Chromosome, GaConfig};
use crate::guillotine::{FitPolicy, SplitRule};
use crate::packing::{self, Packing};
use crate::types::{
    Optimization, OptimizeRequest, Part, PartInstance, SheetLayout, SheetSpec, Totals,
    UnplacedPart, UnplacedReason, Validation,
};
use rand::prelude::*;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Strategies whose efficiencies are closer than this many percentage points
/// are considered tied, and the one with fewer sheets wins.
pub const EFFICIENCY_TIE_PP: f64 = 0.1;

const GREEDY_POLICIES: [FitPolicy; 4] = [
    FitPolicy::BestAreaFit,
    FitPolicy::BestShortSideFit,
    FitPolicy::BestLongSideFit,
    FitPolicy::BottomLeft,
];

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub budget: Budget,
    pub ga: GaConfig,
    pub efficiency_tie_pp: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            budget: Budget::Time(Duration::from_millis(3000)),
            ga: GaConfig::default(),
            efficiency_tie_pp: EFFICIENCY_TIE_PP,
        }
    }
}

impl SolverConfig {
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_time_budget_ms(mut self, ms: u64) -> Self {
        self.budget = Budget::Time(Duration::from_millis(ms));
        self
    }

    pub fn with_ga(mut self, ga: GaConfig) -> Self {
        self.ga = ga;
        self
    }

    pub fn with_efficiency_tie_pp(mut self, pp: f64) -> Self {
        self.efficiency_tie_pp = pp;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    /// Placed plus unplaced pieces no longer match the input count. This is
    /// a bug in expansion or breeding, never a property of the input.
    #[error(
        "piece conservation violated: {total_input} pieces in, {total_placed} placed + {total_unplaced} unplaced"
    )]
    ConservationViolation {
        total_input: usize,
        total_placed: usize,
        total_unplaced: usize,
        input_ids: Vec<String>,
        placed_ids: Vec<String>,
        leftover_ids: Vec<String>,
    },
}

struct StrategyResult {
    name: String,
    packing: Packing,
    efficiency_percent: f64,
}

pub struct Solver {
    sheet: SheetSpec,
    parts: Vec<Part>,
    config: SolverConfig,
    cancel: Arc<AtomicBool>,
}

impl Solver {
    pub fn new(sheet: SheetSpec, parts: Vec<Part>) -> Self {
        Self {
            sheet,
            parts,
            config: SolverConfig::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builds a solver straight from the application's JSON request.
    pub fn from_request(request: OptimizeRequest) -> Self {
        let config = SolverConfig::default().with_time_budget_ms(request.time_budget_ms);
        Self::new(request.sheet, request.parts).with_config(config)
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Flag for cooperative early exit; checked between generations.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Runs the full ensemble with a fresh random seed.
    pub fn solve(&self) -> Result<Optimization, SolveError> {
        self.solve_seeded(thread_rng().next_u64())
    }

    /// Runs the full ensemble reproducibly: the same seed, inputs and a
    /// generation-count budget give bit-identical output.
    pub fn solve_seeded(&self, seed: u64) -> Result<Optimization, SolveError> {
        let instances = packing::expand_parts(&self.parts);
        if instances.is_empty() {
            return Ok(Self::empty_result());
        }

        let mut strategies = vec![self.run_genetic(&instances, seed)];
        strategies.extend(self.run_greedy(&instances));

        for strategy in &strategies {
            tracing::debug!(
                strategy = %strategy.name,
                efficiency = strategy.efficiency_percent,
                sheets = strategy.packing.sheet_count(),
                unplaced = strategy.packing.leftovers.len(),
                "strategy evaluated"
            );
        }

        let tie_pp = self.config.efficiency_tie_pp;
        let winner = strategies
            .into_iter()
            .reduce(|incumbent, candidate| {
                if Self::beats(&candidate, &incumbent, tie_pp) {
                    candidate
                } else {
                    incumbent
                }
            })
            .expect("at least one strategy ran");

        tracing::info!(
            strategy = %winner.name,
            efficiency = winner.efficiency_percent,
            sheets = winner.packing.sheet_count(),
            "optimization complete"
        );

        self.build_result(winner, &instances)
    }

    /// Evolves one population per split rule as independent parallel
    /// searches sharing the caller's budget, then keeps the best packing.
    fn run_genetic(&self, instances: &[PartInstance], seed: u64) -> StrategyResult {
        let rule_budget = match self.config.budget {
            Budget::Time(total) => Budget::Time(total / SplitRule::ALL.len() as u32),
            Budget::Generations(n) => Budget::Generations(n),
        };

        let outcomes: Vec<(SplitRule, Chromosome)> = SplitRule::ALL
            .par_iter()
            .enumerate()
            .map(|(i, &rule)| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let best = genetic::evolve(
                    &self.parts,
                    instances,
                    &self.sheet,
                    rule,
                    rule_budget,
                    &self.config.ga,
                    &mut rng,
                    &self.cancel,
                );
                (rule, best)
            })
            .collect();

        let (rule, chromosome) = outcomes
            .into_iter()
            .reduce(|best, candidate| {
                if candidate.1.fitness < best.1.fitness {
                    candidate
                } else {
                    best
                }
            })
            .expect("split rules are non-empty");

        // Intermediate evaluations discard their sheets; re-derive the
        // winning chromosome's packing once.
        let packing = packing::pack_genes(&chromosome.genes, &self.parts, instances, &self.sheet, rule);
        StrategyResult {
            name: format!("genetic({})", rule.name()),
            efficiency_percent: packing.efficiency_percent(&self.sheet),
            packing,
        }
    }

    fn run_greedy(&self, instances: &[PartInstance]) -> Vec<StrategyResult> {
        GREEDY_POLICIES
            .par_iter()
            .map(|&policy| {
                let packing = packing::pack_greedy(
                    &self.parts,
                    instances,
                    &self.sheet,
                    policy,
                    SplitRule::ShorterAxis,
                );
                StrategyResult {
                    name: policy.name().to_string(),
                    efficiency_percent: packing.efficiency_percent(&self.sheet),
                    packing,
                }
            })
            .collect()
    }

    fn beats(candidate: &StrategyResult, incumbent: &StrategyResult, tie_pp: f64) -> bool {
        if (candidate.efficiency_percent - incumbent.efficiency_percent).abs() < tie_pp {
            candidate.packing.sheet_count() < incumbent.packing.sheet_count()
        } else {
            candidate.efficiency_percent > incumbent.efficiency_percent
        }
    }

    fn build_result(
        &self,
        winner: StrategyResult,
        instances: &[PartInstance],
    ) -> Result<Optimization, SolveError> {
        let packing = winner.packing;

        let total_input = instances.len();
        let total_placed = packing.placed_count();
        let total_unplaced = packing.leftovers.len();
        if total_placed + total_unplaced != total_input {
            let part_id = |i: &PartInstance| self.parts[i.part].id.clone();
            return Err(SolveError::ConservationViolation {
                total_input,
                total_placed,
                total_unplaced,
                input_ids: instances.iter().map(part_id).collect(),
                placed_ids: packing
                    .sheets
                    .iter()
                    .flat_map(|s| &s.placed)
                    .map(|p| self.parts[p.part].id.clone())
                    .collect(),
                leftover_ids: packing
                    .leftovers
                    .iter()
                    .map(|&i| self.parts[instances[i].part].id.clone())
                    .collect(),
            });
        }

        let total_area = packing.total_area(&self.sheet);
        let used_area = packing.used_area();
        let waste_area = total_area - used_area;
        let totals = Totals {
            sheet_count: packing.sheet_count(),
            total_area,
            used_area,
            waste_area,
            waste_percent: if total_area == 0 {
                0.0
            } else {
                waste_area as f64 / total_area as f64 * 100.0
            },
            efficiency_percent: packing.efficiency_percent(&self.sheet),
        };

        let sheets = packing
            .sheets
            .iter()
            .map(|s| SheetLayout {
                width: s.width,
                height: s.height,
                placed_pieces: s.placed.clone(),
                free_rectangles: s.free_rects.clone(),
            })
            .collect();

        let unplaced = packing
            .leftovers
            .iter()
            .map(|&i| {
                let part = &self.parts[instances[i].part];
                UnplacedPart {
                    id: part.id.clone(),
                    width: part.width,
                    height: part.height,
                    rotation_allowed: part.rotation_allowed,
                    gaddi_mark: part.gaddi_mark,
                    laminate_code: part.laminate_code.clone(),
                    nominal_width: part.nominal_width,
                    nominal_height: part.nominal_height,
                    reason: UnplacedReason::TooLarge,
                }
            })
            .collect();

        Ok(Optimization {
            sheets,
            totals,
            unplaced,
            validation: Validation {
                total_input,
                total_placed,
                total_unplaced,
                pieces_lost: total_input as i64 - total_placed as i64 - total_unplaced as i64,
                all_accounted_for: true,
            },
            strategy: winner.name,
        })
    }

    fn empty_result() -> Optimization {
        Optimization {
            sheets: vec![],
            totals: Totals {
                sheet_count: 0,
                total_area: 0,
                used_area: 0,
                waste_area: 0,
                waste_percent: 0.0,
                efficiency_percent: 0.0,
            },
            unplaced: vec![],
            validation: Validation {
                total_input: 0,
                total_placed: 0,
                total_unplaced: 0,
                pieces_lost: 0,
                all_accounted_for: true,
            },
            strategy: "none".to_string(),
        }
    }
}
