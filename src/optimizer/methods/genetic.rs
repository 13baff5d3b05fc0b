//! Genetic search over packing genomes.
//!
//! Two genome representations share one evolutionary loop: a permutation
//! genome packed by greedy insert in genome order, and an include/skip
//! bitstring evaluated in original order. Selection is a size-3 tournament
//! with single-elite preservation; the run stops at the generation cap, at
//! the wall-clock cap, or when the best has not improved across the last
//! fifth of the generation budget. Seeded RNG makes a run reproducible
//! within one build.

use std::cmp::Ordering;
use std::marker::PhantomData;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::errors::MethodError;
use crate::types::MarketOrder;

use super::super::config::GeneticConfig;
use super::super::knapsack::Knapsack;
use super::{OptimizationMethod, SearchBudget};

/// A candidate packing in genome form.
pub trait Genome: Clone + Send {
    /// Short model name for log records.
    const NAME: &'static str;

    fn spawn(len: usize, rng: &mut SmallRng) -> Self;

    fn mutate(&mut self, rng: &mut SmallRng);

    fn crossover(&self, other: &Self, rng: &mut SmallRng) -> Self;

    /// Materialize the packing this genome encodes. Infeasible picks are
    /// skipped, so every genome decodes to a valid knapsack.
    fn build(&self, base: &Knapsack, orders: &[MarketOrder]) -> Knapsack;
}

/// Permutation of order indices; packed greedily in genome order.
#[derive(Debug, Clone)]
pub struct PackedOrdersGenome {
    order: Vec<u32>,
}

impl Genome for PackedOrdersGenome {
    const NAME: &'static str = "GMP";

    fn spawn(len: usize, rng: &mut SmallRng) -> Self {
        let mut order: Vec<u32> = (0..len as u32).collect();
        order.shuffle(rng);
        Self { order }
    }

    fn mutate(&mut self, rng: &mut SmallRng) {
        let n = self.order.len();
        if n < 2 {
            return;
        }
        let p = 1.0 / n as f64;
        for i in 0..n {
            if rng.gen_bool(p) {
                let j = rng.gen_range(0..n);
                self.order.swap(i, j);
            }
        }
    }

    /// Order crossover (OX1): a contiguous window from one parent, the
    /// remaining indices in the other parent's relative order.
    fn crossover(&self, other: &Self, rng: &mut SmallRng) -> Self {
        let n = self.order.len();
        if n < 2 {
            return self.clone();
        }

        let a = rng.gen_range(0..n);
        let b = rng.gen_range(0..n);
        let (start, end) = (a.min(b), a.max(b));

        let mut taken = vec![false; n];
        let mut child = vec![u32::MAX; n];
        for i in start..=end {
            child[i] = self.order[i];
            taken[self.order[i] as usize] = true;
        }

        let mut fill = other.order.iter().filter(|&&idx| !taken[idx as usize]);
        for slot in child.iter_mut() {
            if *slot == u32::MAX {
                *slot = *fill.next().expect("OX1 fill is exactly the complement");
            }
        }

        Self { order: child }
    }

    fn build(&self, base: &Knapsack, orders: &[MarketOrder]) -> Knapsack {
        let mut knapsack = base.clone();
        for &idx in &self.order {
            let _ = knapsack.put(&orders[idx as usize]);
        }
        knapsack
    }
}

/// Include/skip bitstring; selected orders are inserted in original order.
#[derive(Debug, Clone)]
pub struct DecisionOrdersGenome {
    take: Vec<bool>,
}

impl Genome for DecisionOrdersGenome {
    const NAME: &'static str = "GMD";

    fn spawn(len: usize, rng: &mut SmallRng) -> Self {
        Self {
            take: (0..len).map(|_| rng.gen_bool(0.5)).collect(),
        }
    }

    fn mutate(&mut self, rng: &mut SmallRng) {
        let n = self.take.len();
        if n == 0 {
            return;
        }
        let p = 1.0 / n as f64;
        for bit in self.take.iter_mut() {
            if rng.gen_bool(p) {
                *bit = !*bit;
            }
        }
    }

    fn crossover(&self, other: &Self, rng: &mut SmallRng) -> Self {
        let take = self
            .take
            .iter()
            .zip(other.take.iter())
            .map(|(&a, &b)| if rng.gen_bool(0.5) { a } else { b })
            .collect();
        Self { take }
    }

    fn build(&self, base: &Knapsack, orders: &[MarketOrder]) -> Knapsack {
        let mut knapsack = base.clone();
        for (order, &take) in orders.iter().zip(self.take.iter()) {
            if take {
                let _ = knapsack.put(order);
            }
        }
        knapsack
    }
}

/// The evolutionary loop, parameterized by genome representation.
pub struct GeneticModel<G> {
    config: GeneticConfig,
    seed: u64,
    _genome: PhantomData<G>,
}

impl<G> GeneticModel<G> {
    pub fn new(config: GeneticConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            _genome: PhantomData,
        }
    }
}

struct Scored<G> {
    genome: G,
    fitness: f64,
}

fn tournament<'a, G>(population: &'a [Scored<G>], rng: &mut SmallRng) -> &'a Scored<G> {
    const TOURNAMENT_SIZE: usize = 3;
    (0..TOURNAMENT_SIZE)
        .map(|_| &population[rng.gen_range(0..population.len())])
        .max_by(|a, b| {
            a.fitness
                .partial_cmp(&b.fitness)
                .unwrap_or(Ordering::Equal)
        })
        .expect("tournament over a non-empty population")
}

impl<G: Genome> OptimizationMethod for GeneticModel<G> {
    fn optimize(
        &self,
        knapsack: &mut Knapsack,
        orders: &[MarketOrder],
        budget: &SearchBudget,
    ) -> Result<(), MethodError> {
        if orders.is_empty() {
            return Ok(());
        }

        let budget = budget.narrowed(self.config.max_age());
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let base = knapsack.clone();

        let score = |genome: G| -> Scored<G> {
            let fitness = genome.build(&base, orders).pps_f64();
            Scored { genome, fitness }
        };

        let mut population: Vec<Scored<G>> = (0..self.config.population_size)
            .map(|_| score(G::spawn(orders.len(), &mut rng)))
            .collect();

        let best_of = |population: &[Scored<G>]| -> usize {
            population
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.fitness
                        .partial_cmp(&b.fitness)
                        .unwrap_or(Ordering::Equal)
                })
                .map(|(i, _)| i)
                .expect("non-empty population")
        };

        let mut best_idx = best_of(&population);
        let mut best = Scored {
            genome: population[best_idx].genome.clone(),
            fitness: population[best_idx].fitness,
        };

        let stagnation_window = (self.config.max_generations / 5).max(1);
        let mut last_improved = 0usize;
        let mut generations_run = 0usize;

        'evolution: for generation in 0..self.config.max_generations {
            if budget.expired() {
                break;
            }
            if generation.saturating_sub(last_improved) >= stagnation_window {
                break;
            }

            let mut next = Vec::with_capacity(self.config.population_size);
            next.push(Scored {
                genome: best.genome.clone(),
                fitness: best.fitness,
            });

            while next.len() < self.config.population_size {
                if budget.expired() {
                    break 'evolution;
                }
                let parent_a = tournament(&population, &mut rng);
                let parent_b = tournament(&population, &mut rng);
                let mut child = parent_a.genome.crossover(&parent_b.genome, &mut rng);
                child.mutate(&mut rng);
                next.push(score(child));
            }

            population = next;
            generations_run = generation + 1;

            best_idx = best_of(&population);
            if population[best_idx].fitness > best.fitness {
                best = Scored {
                    genome: population[best_idx].genome.clone(),
                    fitness: population[best_idx].fitness,
                };
                last_improved = generation;
            }
        }

        debug!(
            generations = generations_run,
            fitness = best.fitness,
            "genetic search finished"
        );

        *knapsack = best.genome.build(&base, orders);
        Ok(())
    }

    fn name(&self) -> &'static str {
        G::NAME
    }
}
