//! Truncation ("elite") selection.

use crate::genome::Genome;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;

/// Returns the `mu` fittest genomes, best first.
///
/// Equal fitness keeps the input order. Returns fewer than `mu` genomes
/// when the input is smaller.
///
/// # Complexity
/// O(n log n)
pub fn elite<G: Genome>(mu: usize, genomes: &[Arc<G>]) -> Vec<Arc<G>> {
    let fitness = evaluate(genomes);
    rank_by_fitness(&fitness)
        .into_iter()
        .take(mu)
        .map(|i| genomes[i].clone())
        .collect()
}

/// Evaluates every competitor, in parallel when the `parallel` feature is on.
pub(crate) fn evaluate<G: Genome>(competitors: &[Arc<G>]) -> Vec<f64> {
    #[cfg(feature = "parallel")]
    {
        competitors.par_iter().map(|g| g.fitness()).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        competitors.iter().map(|g| g.fitness()).collect()
    }
}

/// Indices sorted by descending fitness (stable).
pub(crate) fn rank_by_fitness(fitness: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| {
        fitness[b]
            .partial_cmp(&fitness[a])
            .unwrap_or(Ordering::Equal)
    });
    order
}
