//! Generational population handle.

use super::config::GenerationalConfig;
use super::control::{Control, Controller, ReservationToken};
use super::types::Phase;
use crate::error::{EvoError, EvoResult};
use crate::genome::{leaves, stats_of, Genome, Members, Population};
use crate::stats::Stats;
use crossbeam_channel::{bounded, unbounded, Sender};
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A population that evolves in synchronized generations.
///
/// Every member is evolved once per generation, concurrently, against the
/// whole current generation as suitors. The new generation replaces the old
/// one only after every member has been evolved.
///
/// A generational population is itself a [`Genome`]: placed inside another
/// population, its `evolve` exchanges `migration_size` random members with a
/// random peer population. A [`Graph`](crate::graph::Graph) of generational
/// populations is an island model.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_evo::generational::{Generational, GenerationalConfig};
/// use u_evo::{Genome, Population};
///
/// struct Guess(i64);
///
/// impl Genome for Guess {
///     fn fitness(&self) -> f64 { -((self.0 - 42).abs() as f64) }
///     fn evolve(self: Arc<Self>, _suitors: &[Arc<Self>]) -> Arc<Self> {
///         if self.0 == 42 { self } else { Arc::new(Guess(self.0 + (42 - self.0).signum())) }
///     }
/// }
///
/// let seeds = (0..10).map(|i| Arc::new(Guess(i * 10)));
/// let pop = Generational::new(seeds, GenerationalConfig::default()).unwrap();
/// while pop.stats().min() < 0.0 {}
/// pop.close().unwrap();
/// ```
pub struct Generational<G: Genome> {
    size: usize,
    config: GenerationalConfig,
    requests: Sender<Control<G>>,
    control: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    /// Release failures from migrations, reported by `close`. Taken (left
    /// `None`) once `close` has collected them.
    failures: Mutex<Option<Vec<EvoError>>>,
}

impl<G: Genome> Generational<G> {
    /// Creates a population and starts its first generation.
    ///
    /// # Errors
    ///
    /// - [`EvoError::EmptyPopulation`] if `members` is empty.
    /// - [`EvoError::InvalidConfig`] if `config` does not validate.
    /// - [`EvoError::Spawn`] if the control thread cannot be started; the
    ///   members have been released.
    pub fn new<V>(members: V, config: GenerationalConfig) -> EvoResult<Self>
    where
        V: IntoIterator<Item = Arc<G>>,
    {
        let members: Vec<Arc<G>> = members.into_iter().collect();
        if members.is_empty() {
            return Err(EvoError::EmptyPopulation);
        }
        config.validate()?;

        let size = members.len();
        let (requests, inbox) = unbounded();
        let controller = Controller::new(members, config.delay, inbox);

        let (hand_tx, hand_rx) = bounded::<Controller<G>>(1);
        let control = thread::Builder::new()
            .name("u-evo-generational".into())
            .spawn(move || {
                if let Ok(controller) = hand_rx.recv() {
                    controller.run();
                }
            });
        let control = match control {
            Ok(handle) => handle,
            Err(e) => {
                controller.abandon();
                return Err(EvoError::Spawn(e));
            }
        };
        if hand_tx.send(controller).is_err() {
            return Err(EvoError::Closed);
        }

        tracing::debug!(size, "generational population started");
        Ok(Self {
            size,
            config,
            requests,
            control: Mutex::new(Some(control)),
            closed: AtomicBool::new(false),
            failures: Mutex::new(Some(Vec::new())),
        })
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Always `false`: empty populations cannot be built.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The configuration this population was built with.
    pub fn config(&self) -> &GenerationalConfig {
        &self.config
    }

    /// A copy of the current generation. Empty once closed.
    pub fn members(&self) -> Vec<Arc<G>> {
        self.call(|reply| Control::Members { reply })
            .unwrap_or_default()
    }

    /// The current lifecycle state.
    pub fn phase(&self) -> Phase {
        if self.closed.load(Ordering::SeqCst) {
            return Phase::Closed;
        }
        self.call(|reply| Control::Phase { reply })
            .unwrap_or(Phase::Closed)
    }

    /// Number of generations completed so far.
    pub fn generation(&self) -> u64 {
        self.call(|reply| Control::Generation { reply })
            .unwrap_or_default()
    }

    /// Sets the pause between generations.
    pub fn set_delay(&self, delay: Duration) {
        let _ = self.requests.send(Control::SetDelay(delay));
    }

    /// Exchanges members with `other`.
    ///
    /// `k = min(migration_size, self.len(), other.len())` random members of
    /// each population swap places. Every displaced member is adopted by
    /// the other population; nothing is released. Returns `false` without
    /// changing anything when either side is already migrating or closed.
    pub fn migrate(&self, other: &Generational<G>) -> bool {
        let count = self.config.migration_size.min(self.size).min(other.size);

        let (here, emigrants) = match self.emigrate(count) {
            Ok(reservation) => reservation,
            Err(e) => {
                tracing::debug!(error = %e, "migration skipped");
                return false;
            }
        };
        let (there, immigrants) = match other.emigrate(count) {
            Ok(reservation) => reservation,
            Err(e) => {
                self.release(here);
                tracing::debug!(error = %e, "migration skipped");
                return false;
            }
        };

        if self.immigrate(here, immigrants).is_err() {
            other.release(there);
            self.orphan(&emigrants);
            return false;
        }
        if other.immigrate(there, emigrants.clone()).is_err() {
            self.orphan(&emigrants);
            return false;
        }

        tracing::debug!(count, "migration performed");
        true
    }

    fn emigrate(&self, count: usize) -> EvoResult<(ReservationToken, Vec<Arc<G>>)> {
        self.call(|reply| Control::Emigrate { count, reply })?
    }

    fn immigrate(&self, token: ReservationToken, genomes: Vec<Arc<G>>) -> EvoResult<()> {
        self.call(|reply| Control::Immigrate {
            token,
            genomes,
            reply,
        })?
    }

    fn release(&self, token: ReservationToken) {
        let _ = self.requests.send(Control::Release { token });
    }

    fn orphan(&self, genomes: &[Arc<G>]) {
        tracing::warn!(
            count = genomes.len(),
            "migration counterpart closed; releasing orphaned genomes"
        );
        for genome in genomes {
            if let Err(e) = genome.close() {
                match self.failures.lock().as_mut() {
                    Some(failures) => {
                        tracing::warn!(error = %e, "orphan release failed");
                        failures.push(e);
                    }
                    None => tracing::warn!(
                        error = %e,
                        "orphan release failed after close; failure not reported"
                    ),
                }
            }
        }
    }

    fn call<T>(&self, request: impl FnOnce(Sender<T>) -> Control<G>) -> EvoResult<T> {
        let (tx, rx) = bounded(1);
        self.requests
            .send(request(tx))
            .map_err(|_| EvoError::Closed)?;
        rx.recv().map_err(|_| EvoError::Closed)
    }
}

impl<G: Genome> Genome for Generational<G> {
    /// Fitness of the best member.
    fn fitness(&self) -> f64 {
        self.stats().max()
    }

    /// Migrates members with a random other population among `suitors`.
    fn evolve(self: Arc<Self>, suitors: &[Arc<Self>]) -> Arc<Self> {
        let others: Vec<&Arc<Self>> = suitors.iter().filter(|s| !Arc::ptr_eq(s, &self)).collect();
        if let Some(other) = others.choose(&mut rand::rng()) {
            self.migrate(other);
        }
        self
    }

    /// Waits for the running generation, performs its turnover, and
    /// releases every member. Calls after the first return `Ok(())`.
    fn close(&self) -> EvoResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut failures = self
            .call(|reply| Control::Shutdown { reply })
            .unwrap_or_default();
        if let Some(handle) = self.control.lock().take() {
            if handle.join().is_err() {
                tracing::error!("generational control thread panicked");
            }
        }
        failures.extend(self.failures.lock().take().unwrap_or_default());
        EvoError::from_failures(failures)
    }

    fn as_population(&self) -> Option<&dyn Population> {
        Some(self)
    }
}

impl<G: Genome> Population for Generational<G> {
    fn stats(&self) -> Stats {
        stats_of(&self.members())
    }

    fn iter(&self) -> Members {
        leaves(self.members())
    }
}

impl<G: Genome> Drop for Generational<G> {
    fn drop(&mut self) {
        if let Err(e) = Genome::close(self) {
            tracing::warn!(error = %e, "release failures dropped with unclosed population");
        }
    }
}
