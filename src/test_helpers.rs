//! Instrumented genomes for tests.

use crate::error::{EvoError, EvoResult};
use crate::genome::Genome;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Records every probe created and every close issued.
#[derive(Default)]
pub struct Ledger {
    next_id: AtomicU64,
    closes: Mutex<HashMap<u64, usize>>,
}

impl Ledger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn closed(&self) -> usize {
        self.closes.lock().len()
    }

    /// Ids closed more than once.
    pub fn double_closed(&self) -> Vec<u64> {
        self.closes
            .lock()
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Every probe created has been closed exactly once.
    pub fn all_closed_once(&self) -> bool {
        let closes = self.closes.lock();
        closes.len() == self.created() && closes.values().all(|&n| n == 1)
    }

    fn register(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn record_close(&self, id: u64) {
        *self.closes.lock().entry(id).or_insert(0) += 1;
    }
}

/// How a probe answers `evolve`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    /// Returns a new child with fitness one above the best of self and suitors.
    Climb,
    /// Returns itself.
    Stay,
    /// Panics.
    Panic,
}

/// A genome that counts its own closes.
pub struct Probe {
    pub id: u64,
    fitness: f64,
    behavior: Behavior,
    pace: Duration,
    fail_close: bool,
    closes: AtomicUsize,
    ledger: Arc<Ledger>,
}

impl Probe {
    /// A `Stay` probe with a private ledger.
    pub fn new(fitness: f64) -> Arc<Self> {
        Self::build(fitness, Behavior::Stay, Duration::ZERO, false, Ledger::new())
    }

    pub fn with_ledger(fitness: f64, behavior: Behavior, ledger: &Arc<Ledger>) -> Arc<Self> {
        Self::build(fitness, behavior, Duration::ZERO, false, ledger.clone())
    }

    pub fn paced(
        fitness: f64,
        behavior: Behavior,
        pace: Duration,
        ledger: &Arc<Ledger>,
    ) -> Arc<Self> {
        Self::build(fitness, behavior, pace, false, ledger.clone())
    }

    pub fn failing(fitness: f64, ledger: &Arc<Ledger>) -> Arc<Self> {
        Self::build(fitness, Behavior::Stay, Duration::ZERO, true, ledger.clone())
    }

    fn build(
        fitness: f64,
        behavior: Behavior,
        pace: Duration,
        fail_close: bool,
        ledger: Arc<Ledger>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ledger.register(),
            fitness,
            behavior,
            pace,
            fail_close,
            closes: AtomicUsize::new(0),
            ledger,
        })
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Genome for Probe {
    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn evolve(self: Arc<Self>, suitors: &[Arc<Self>]) -> Arc<Self> {
        if !self.pace.is_zero() {
            std::thread::sleep(self.pace);
        }
        match self.behavior {
            Behavior::Stay => self,
            Behavior::Panic => panic!("probe {} refuses to evolve", self.id),
            Behavior::Climb => {
                let best = suitors
                    .iter()
                    .map(|s| s.fitness)
                    .fold(self.fitness, f64::max);
                Self::build(
                    best + 1.0,
                    self.behavior,
                    self.pace,
                    self.fail_close,
                    self.ledger.clone(),
                )
            }
        }
    }

    fn close(&self) -> EvoResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.ledger.record_close(self.id);
        if self.fail_close {
            Err(EvoError::release(format!("probe {} failed to close", self.id)))
        } else {
            Ok(())
        }
    }
}
