//! Round-robin tournament selection.
//!
//! Every competitor meets others according to a rotating schedule; the
//! ranking is by number of pairings won. Repeated fitness comparisons make
//! this scheme robust against noisy fitness functions.

use crate::genome::Genome;
use rand::seq::SliceRandom;
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::sync::Arc;

/// Returns the `mu` genomes that won the most pairings over `rounds` rounds.
///
/// An odd number of competitors is padded with a sentinel that loses every
/// pairing. Equal win counts keep the input order.
pub fn round_robin<G: Genome>(mu: usize, rounds: usize, genomes: &[Arc<G>]) -> Vec<Arc<G>> {
    let wins = tourney(genomes, rounds, &mut rand::rng());
    rank_by_wins(&wins[..genomes.len()])
        .into_iter()
        .take(mu)
        .map(|i| genomes[i].clone())
        .collect()
}

/// Plays the tournament and returns the win count of every entrant.
///
/// When `competitors` has odd length the result has one extra entry, the
/// sentinel's, at the end.
///
/// # Schedule
///
/// The entrants are randomly permuted. In each round position `i` meets
/// position `size - 1 - i`; then every position but the last rotates by
/// one. After `size - 1` rounds every pair has met exactly once.
pub(crate) fn tourney<G: Genome, R: Rng + ?Sized>(
    competitors: &[Arc<G>],
    rounds: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut entrants: Vec<Option<&Arc<G>>> = competitors.iter().map(Some).collect();
    if entrants.len() % 2 != 0 {
        entrants.push(None);
    }

    let size = entrants.len();
    let mut wins = vec![0usize; size];
    if size == 0 {
        return wins;
    }

    let half = size / 2;
    let mut schedule: Vec<usize> = (0..size).collect();
    schedule.shuffle(rng);

    let mut pairings = Vec::with_capacity(rounds * half);
    for _ in 0..rounds {
        for i in 0..half {
            pairings.push((schedule[i], schedule[size - 1 - i]));
        }
        schedule[..size - 1].rotate_left(1);
    }

    #[cfg(feature = "parallel")]
    let winners: Vec<usize> = pairings
        .par_iter()
        .map(|&(i, j)| duel(&entrants, i, j))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let winners: Vec<usize> = pairings
        .iter()
        .map(|&(i, j)| duel(&entrants, i, j))
        .collect();

    for w in winners {
        wins[w] += 1;
    }
    wins
}

/// Index of the winner of one pairing. The sentinel (`None`) always loses.
fn duel<G: Genome>(entrants: &[Option<&Arc<G>>], i: usize, j: usize) -> usize {
    match (entrants[i], entrants[j]) {
        (None, _) => j,
        (_, None) => i,
        (Some(a), Some(b)) => {
            if a.fitness() < b.fitness() {
                j
            } else {
                i
            }
        }
    }
}

/// Indices sorted by descending win count (stable).
pub(crate) fn rank_by_wins(wins: &[usize]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..wins.len()).collect();
    order.sort_by(|&a, &b| wins[b].cmp(&wins[a]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::Probe;

    fn probes(fitness: &[f64]) -> Vec<Arc<Probe>> {
        fitness.iter().map(|&f| Probe::new(f)).collect()
    }

    #[test]
    fn test_full_round_robin_ranks_by_fitness() {
        let pop = probes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 0.0]);
        // 9 rounds over 10 entrants: every pair meets exactly once.
        let best: Vec<f64> = round_robin(5, 9, &pop).iter().map(|g| g.fitness()).collect();
        assert_eq!(best, vec![9.0, 8.0, 7.0, 6.0, 5.0]);
    }

    #[test]
    fn test_every_pair_meets_once() {
        let pop = probes(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let wins = tourney(&pop, 5, &mut rand::rng());
        // Entrant with fitness k beats exactly the k weaker ones.
        assert_eq!(wins, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_odd_pool_padded_with_losing_sentinel() {
        let pop = probes(&[-5.0, -1.0, -3.0, -2.0, -4.0]);
        let rounds = 7;
        let wins = tourney(&pop, rounds, &mut rand::rng());
        assert_eq!(wins.len(), 6, "exactly one sentinel");
        assert_eq!(wins[5], 0, "sentinel never wins");
        assert_eq!(wins.iter().sum::<usize>(), rounds * 3);
    }

    #[test]
    fn test_sentinel_loses_even_to_negative_infinity() {
        let pop = probes(&[f64::NEG_INFINITY]);
        let wins = tourney(&pop, 3, &mut rand::rng());
        assert_eq!(wins, vec![3, 0]);
    }

    #[test]
    fn test_empty_tourney() {
        let pop: Vec<Arc<Probe>> = Vec::new();
        assert!(tourney(&pop, 3, &mut rand::rng()).is_empty());
    }

    #[test]
    fn test_rank_by_wins_stable() {
        assert_eq!(rank_by_wins(&[2, 5, 2, 5]), vec![1, 3, 0, 2]);
    }
}
