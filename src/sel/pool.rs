//! Bounded concurrent selection pools.
//!
//! A [`SelectionPool`] implements (μ, λ) selection across independent
//! producers. Producers [`put`](SelectionPool::put) children and
//! [`get`](SelectionPool::get) winners at the pool's ratio, λ/μ children
//! per winner; nobody has to know how many other producers exist or when
//! they run.
//!
//! A round proceeds in three phases:
//!
//! 1. **Collecting**: `put` appends competitors until λ have arrived.
//! 2. **Ranking**: the producer whose `put` completed the round ranks the
//!    competitors, outside the pool lock.
//! 3. **Draining**: `get` hands out the μ winners in rank order. Further
//!    `put` calls block until the last winner has been taken.

use super::elite::{evaluate, rank_by_fitness};
use super::round_robin::{rank_by_wins, tourney};
use crate::error::{EvoError, EvoResult};
use crate::genome::Genome;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// How a pool ranks a full round of competitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ranking {
    /// Rank by fitness, evaluated once per competitor.
    Elite,

    /// Rank by pairings won over `rounds` rounds of a round-robin
    /// tournament.
    RoundRobin { rounds: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collecting,
    Ranking,
    Draining,
}

struct PoolState<G> {
    phase: Phase,
    competitors: Vec<Arc<G>>,
    winners: VecDeque<Arc<G>>,
    rounds_completed: u64,
    closed: bool,
    failures: Vec<EvoError>,
}

/// A concurrent (μ, λ) tournament shared by many producers.
///
/// Share it between genomes as `Arc<SelectionPool<G>>`.
///
/// # Ownership
///
/// A genome passed to `put` belongs to the pool. Winners are handed to the
/// callers of `get`; every other competitor is released with
/// [`Genome::close`] once the round is ranked, unless it is the very same
/// instance as a winner. Release failures are reported by
/// [`close`](SelectionPool::close).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_evo::sel::SelectionPool;
/// use u_evo::Genome;
///
/// struct Score(f64);
///
/// impl Genome for Score {
///     fn fitness(&self) -> f64 { self.0 }
///     fn evolve(self: Arc<Self>, _suitors: &[Arc<Self>]) -> Arc<Self> { self }
/// }
///
/// let pool = SelectionPool::elite(2, 4).unwrap();
/// for f in [3.0, 1.0, 4.0, 2.0] {
///     pool.put(Arc::new(Score(f))).unwrap();
/// }
/// assert_eq!(pool.get().unwrap().fitness(), 4.0);
/// assert_eq!(pool.get().unwrap().fitness(), 3.0);
/// pool.close().unwrap();
/// ```
pub struct SelectionPool<G: Genome> {
    mu: usize,
    lambda: usize,
    ranking: Ranking,
    state: Mutex<PoolState<G>>,
    /// Signalled when winners become available or the pool closes.
    ranked: Condvar,
    /// Signalled when the pool starts collecting again or closes.
    drained: Condvar,
}

impl<G: Genome> SelectionPool<G> {
    /// Elite pool: the μ fittest of every λ competitors win.
    pub fn elite(mu: usize, lambda: usize) -> EvoResult<Self> {
        Self::new(mu, lambda, Ranking::Elite)
    }

    /// Round-robin pool: the μ competitors that won the most pairings over
    /// `rounds` rounds win. An odd λ is padded with a losing sentinel.
    pub fn round_robin(mu: usize, lambda: usize, rounds: usize) -> EvoResult<Self> {
        Self::new(mu, lambda, Ranking::RoundRobin { rounds })
    }

    /// Creates a pool with an explicit ranking.
    pub fn new(mu: usize, lambda: usize, ranking: Ranking) -> EvoResult<Self> {
        let rounds = match ranking {
            Ranking::Elite => 0,
            Ranking::RoundRobin { rounds } => rounds,
        };
        let invalid = |reason| EvoError::InvalidPool {
            mu,
            lambda,
            rounds,
            reason,
        };
        if mu == 0 {
            return Err(invalid("mu must be at least 1"));
        }
        if lambda < mu {
            return Err(invalid("lambda must be at least mu"));
        }
        if matches!(ranking, Ranking::RoundRobin { rounds: 0 }) {
            return Err(invalid("round-robin needs at least one round"));
        }

        Ok(Self {
            mu,
            lambda,
            ranking,
            state: Mutex::new(PoolState {
                phase: Phase::Collecting,
                competitors: Vec::with_capacity(lambda),
                winners: VecDeque::with_capacity(mu),
                rounds_completed: 0,
                closed: false,
                failures: Vec::new(),
            }),
            ranked: Condvar::new(),
            drained: Condvar::new(),
        })
    }

    /// Number of winners per round.
    pub fn mu(&self) -> usize {
        self.mu
    }

    /// Number of competitors per round.
    pub fn lambda(&self) -> usize {
        self.lambda
    }

    /// The ranking scheme.
    pub fn ranking(&self) -> Ranking {
        self.ranking
    }

    /// Number of rounds ranked so far.
    pub fn rounds_completed(&self) -> u64 {
        self.state.lock().rounds_completed
    }

    /// Adds a competitor to the current round.
    ///
    /// Blocks while the previous round's winners are still being retrieved.
    /// The call that brings the round to λ competitors also ranks it.
    ///
    /// Returns [`EvoError::Closed`] if the pool is closed; the genome is
    /// then released, and a release failure is logged.
    pub fn put(&self, genome: Arc<G>) -> EvoResult<()> {
        let mut state = self.state.lock();
        while state.phase != Phase::Collecting && !state.closed {
            self.drained.wait(&mut state);
        }
        if state.closed {
            drop(state);
            if let Err(e) = genome.close() {
                tracing::warn!(error = %e, "failed to release competitor refused by closed pool");
            }
            return Err(EvoError::Closed);
        }

        state.competitors.push(genome);
        if state.competitors.len() < self.lambda {
            return Ok(());
        }

        state.phase = Phase::Ranking;
        let competitors = std::mem::replace(&mut state.competitors, Vec::with_capacity(self.lambda));
        drop(state);

        let (winners, losers) = self.rank(competitors);
        let mut failures = release_all(losers);

        let mut state = self.state.lock();
        state.rounds_completed += 1;
        tracing::debug!(
            round = state.rounds_completed,
            mu = self.mu,
            lambda = self.lambda,
            "selection round ranked"
        );
        if state.closed {
            // Closed while ranking: nobody will collect these winners, and
            // close has already reported its failures.
            drop(state);
            failures.extend(release_all(winners));
            if !failures.is_empty() {
                tracing::warn!(
                    failures = failures.len(),
                    "release failures after pool close not reported"
                );
            }
            return Ok(());
        }
        state.failures.extend(failures);
        state.winners.extend(winners);
        state.phase = Phase::Draining;
        self.ranked.notify_all();
        Ok(())
    }

    /// Retrieves the next winner of the current round.
    ///
    /// Blocks until the round has been ranked. Returns
    /// [`EvoError::Closed`] once the pool is closed.
    pub fn get(&self) -> EvoResult<Arc<G>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(EvoError::Closed);
            }
            if state.phase == Phase::Draining {
                if let Some(winner) = state.winners.pop_front() {
                    if state.winners.is_empty() {
                        state.phase = Phase::Collecting;
                        self.drained.notify_all();
                    }
                    return Ok(winner);
                }
            }
            self.ranked.wait(&mut state);
        }
    }

    /// Closes the pool.
    ///
    /// Wakes every blocked `put` and `get` with [`EvoError::Closed`],
    /// releases pending competitors and unclaimed winners, and reports
    /// every release failure seen during the pool's lifetime. Calls after
    /// the first return `Ok(())`.
    pub fn close(&self) -> EvoResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        let mut pending: Vec<Arc<G>> = state.competitors.drain(..).collect();
        pending.extend(state.winners.drain(..));
        let mut failures = std::mem::take(&mut state.failures);
        self.ranked.notify_all();
        self.drained.notify_all();
        drop(state);

        failures.extend(release_all(pending));
        EvoError::from_failures(failures)
    }

    /// Splits a full round into the top μ (in rank order) and the rest.
    fn rank(&self, competitors: Vec<Arc<G>>) -> (Vec<Arc<G>>, Vec<Arc<G>>) {
        let order = match self.ranking {
            Ranking::Elite => rank_by_fitness(&evaluate(&competitors)),
            Ranking::RoundRobin { rounds } => {
                let wins = tourney(&competitors, rounds, &mut rand::rng());
                rank_by_wins(&wins[..competitors.len()])
            }
        };

        let mut slots: Vec<Option<Arc<G>>> = competitors.into_iter().map(Some).collect();
        let winners: Vec<Arc<G>> = order
            .iter()
            .take(self.mu)
            .filter_map(|&i| slots[i].take())
            .collect();
        let losers: Vec<Arc<G>> = slots
            .into_iter()
            .flatten()
            .filter(|loser| !winners.iter().any(|w| Arc::ptr_eq(w, loser)))
            .collect();
        (winners, losers)
    }
}

/// Releases every genome, returning the failures. Repeated instances are
/// released once.
fn release_all<G: Genome>(genomes: Vec<Arc<G>>) -> Vec<EvoError> {
    let mut released: Vec<Arc<G>> = Vec::with_capacity(genomes.len());
    let mut failures = Vec::new();
    for genome in genomes {
        if released.iter().any(|r| Arc::ptr_eq(r, &genome)) {
            continue;
        }
        if let Err(e) = genome.close() {
            tracing::warn!(error = %e, "failed to release selection competitor");
            failures.push(e);
        }
        released.push(genome);
    }
    failures
}
