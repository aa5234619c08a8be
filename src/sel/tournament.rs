//! Single-winner selectors.

use crate::genome::Genome;
use rand::Rng;
use std::sync::Arc;

/// Returns the fittest suitor. Ties go to the earliest.
///
/// # Panics
/// Panics if `suitors` is empty.
pub fn tournament<G: Genome>(suitors: &[Arc<G>]) -> Arc<G> {
    assert!(!suitors.is_empty(), "cannot select from empty suitors");
    let mut best = &suitors[0];
    let mut best_fit = best.fitness();
    for s in &suitors[1..] {
        let fit = s.fitness();
        if fit > best_fit {
            best = s;
            best_fit = fit;
        }
    }
    best.clone()
}

/// Returns the least fit suitor. Ties go to the earliest.
///
/// # Panics
/// Panics if `suitors` is empty.
pub fn weakest<G: Genome>(suitors: &[Arc<G>]) -> Arc<G> {
    assert!(!suitors.is_empty(), "cannot select from empty suitors");
    let mut worst = &suitors[0];
    let mut worst_fit = worst.fitness();
    for s in &suitors[1..] {
        let fit = s.fitness();
        if fit < worst_fit {
            worst = s;
            worst_fit = fit;
        }
    }
    worst.clone()
}

/// Picks two distinct suitors at random and returns the fitter.
///
/// With two suitors both compete; with one it is returned as is.
///
/// # Panics
/// Panics if `suitors` is empty.
pub fn binary_tournament<G: Genome, R: Rng + ?Sized>(suitors: &[Arc<G>], rng: &mut R) -> Arc<G> {
    assert!(!suitors.is_empty(), "cannot select from empty suitors");
    let n = suitors.len();
    if n == 1 {
        return suitors[0].clone();
    }

    let (x, y) = if n > 2 {
        let x = rng.random_range(0..n);
        let mut y = rng.random_range(0..n - 1);
        if y >= x {
            y += 1;
        }
        (x, y)
    } else {
        (0, 1)
    };

    if suitors[x].fitness() < suitors[y].fitness() {
        suitors[y].clone()
    } else {
        suitors[x].clone()
    }
}
