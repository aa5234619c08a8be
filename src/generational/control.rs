//! The control loop of a generational population.
//!
//! One control thread owns the member buffer. Each generation it spawns one
//! evaluation thread per member; every evaluation sees the same snapshot of
//! the generation as suitors. Completed children are held until the last
//! one arrives, then the generation turns over in one step.
//!
//! Migrations interleave with generations. A reservation pins a set of
//! slots: children bred from a pinned member are discarded at turnover, and
//! a slot that received an immigrant records the generation it arrived in,
//! so that children of the displaced member can never overwrite it.

use super::types::Phase;
use crate::error::{panic_message, EvoError, EvoResult};
use crate::genome::Genome;
use crossbeam_channel::{after, never, select, unbounded, Receiver, Sender};
use rand::seq::index;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Proof of a migration reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReservationToken(u64);

pub(crate) enum Control<G> {
    Members {
        reply: Sender<Vec<Arc<G>>>,
    },
    Emigrate {
        count: usize,
        reply: Sender<EvoResult<(ReservationToken, Vec<Arc<G>>)>>,
    },
    Immigrate {
        token: ReservationToken,
        genomes: Vec<Arc<G>>,
        reply: Sender<EvoResult<()>>,
    },
    Release {
        token: ReservationToken,
    },
    SetDelay(Duration),
    Phase {
        reply: Sender<Phase>,
    },
    Generation {
        reply: Sender<u64>,
    },
    Shutdown {
        reply: Sender<Vec<EvoError>>,
    },
}

/// A finished evaluation. `child` is `None` when `evolve` panicked.
struct Update<G> {
    epoch: u64,
    slot: usize,
    parent: Arc<G>,
    child: Option<Arc<G>>,
}

struct Reservation {
    token: ReservationToken,
    slots: Vec<usize>,
}

enum Event<G> {
    Request(Option<Control<G>>),
    Update(Option<Update<G>>),
    Timer,
}

pub(crate) struct Controller<G: Genome> {
    members: Vec<Arc<G>>,
    /// Results of the running generation, by slot.
    next: Vec<Option<Update<G>>>,
    /// Generation in which each slot last received an immigrant.
    installed: Vec<u64>,
    /// Number of the running (or last run) generation; the first is 1.
    epoch: u64,
    completed: u64,
    pending: usize,
    evaluators: Vec<JoinHandle<()>>,
    reservation: Option<Reservation>,
    next_token: u64,
    delay: Duration,
    timer: Receiver<Instant>,
    requests: Receiver<Control<G>>,
    updates_tx: Sender<Update<G>>,
    updates: Receiver<Update<G>>,
    stalled: bool,
    stopping: bool,
    shutdown_reply: Option<Sender<Vec<EvoError>>>,
    failures: Vec<EvoError>,
}

impl<G: Genome> Controller<G> {
    pub(crate) fn new(members: Vec<Arc<G>>, delay: Duration, requests: Receiver<Control<G>>) -> Self {
        let size = members.len();
        let (updates_tx, updates) = unbounded();
        Self {
            members,
            next: (0..size).map(|_| None).collect(),
            installed: vec![0; size],
            epoch: 0,
            completed: 0,
            pending: 0,
            evaluators: Vec::with_capacity(size),
            reservation: None,
            next_token: 0,
            delay,
            timer: never(),
            requests,
            updates_tx,
            updates,
            stalled: false,
            stopping: false,
            shutdown_reply: None,
            failures: Vec::new(),
        }
    }

    /// Releases every member. Used when the control thread never started.
    pub(crate) fn abandon(self) {
        for member in &self.members {
            if let Err(e) = member.close() {
                tracing::warn!(error = %e, "member release failed");
            }
        }
    }

    pub(crate) fn run(mut self) {
        self.breed();
        loop {
            let event = select! {
                recv(self.requests) -> msg => Event::Request(msg.ok()),
                recv(self.updates) -> msg => Event::Update(msg.ok()),
                recv(self.timer) -> _ => Event::Timer,
            };

            match event {
                Event::Request(Some(request)) => self.handle(request),
                Event::Request(None) => {
                    self.requests = never();
                    self.stop();
                }
                Event::Update(Some(update)) => self.record(update),
                Event::Update(None) => {}
                Event::Timer => {
                    self.timer = never();
                    self.breed();
                }
            }

            if self.stopping && self.pending == 0 {
                break;
            }
        }
        self.finish();
    }

    fn handle(&mut self, request: Control<G>) {
        match request {
            Control::Members { reply } => {
                let _ = reply.send(self.members.clone());
            }
            Control::Emigrate { count, reply } => {
                let _ = reply.send(self.emigrate(count));
            }
            Control::Immigrate {
                token,
                genomes,
                reply,
            } => {
                let _ = reply.send(self.immigrate(token, genomes));
            }
            Control::Release { token } => {
                if self.reservation.as_ref().is_some_and(|r| r.token == token) {
                    self.reservation = None;
                }
            }
            Control::SetDelay(delay) => self.delay = delay,
            Control::Phase { reply } => {
                let _ = reply.send(self.phase());
            }
            Control::Generation { reply } => {
                let _ = reply.send(self.completed);
            }
            Control::Shutdown { reply } => {
                self.shutdown_reply = Some(reply);
                self.stop();
            }
        }
    }

    fn phase(&self) -> Phase {
        if self.reservation.is_some() {
            Phase::Migrating
        } else if self.pending > 0 {
            Phase::Evolving
        } else {
            Phase::AwaitingGeneration
        }
    }

    fn stop(&mut self) {
        self.stopping = true;
        self.timer = never();
    }

    /// Reserves up to `count` random slots and hands out their members.
    fn emigrate(&mut self, count: usize) -> EvoResult<(ReservationToken, Vec<Arc<G>>)> {
        if self.reservation.is_some() {
            return Err(EvoError::Busy);
        }
        if self.stopping {
            return Err(EvoError::Closed);
        }
        let count = count.min(self.members.len());
        let slots = index::sample(&mut rand::rng(), self.members.len(), count).into_vec();
        let genomes = slots.iter().map(|&i| self.members[i].clone()).collect();
        let token = ReservationToken(self.next_token);
        self.next_token += 1;
        self.reservation = Some(Reservation { token, slots });
        Ok((token, genomes))
    }

    /// Fills the reserved slots with `genomes`, in reservation order. The
    /// displaced members now belong to the counterpart.
    fn immigrate(&mut self, token: ReservationToken, genomes: Vec<Arc<G>>) -> EvoResult<()> {
        let reservation = match self.reservation.take() {
            Some(r) if r.token == token => r,
            other => {
                self.reservation = other;
                return Err(EvoError::Busy);
            }
        };
        for (slot, genome) in reservation.slots.into_iter().zip(genomes) {
            self.members[slot] = genome;
            self.installed[slot] = self.epoch;
        }
        Ok(())
    }

    /// Starts the next generation.
    fn breed(&mut self) {
        if self.stopping || self.stalled {
            return;
        }
        self.epoch += 1;
        let epoch = self.epoch;
        let suitors: Arc<[Arc<G>]> = self.members.clone().into();

        for slot in 0..self.members.len() {
            let parent = self.members[slot].clone();
            let suitors = suitors.clone();
            let updates = self.updates_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("u-evo-eval-{slot}"))
                .spawn(move || {
                    let result =
                        panic::catch_unwind(AssertUnwindSafe(|| parent.clone().evolve(&suitors)));
                    let child = match result {
                        Ok(child) => Some(child),
                        Err(payload) => {
                            tracing::error!(
                                slot,
                                panic = panic_message(payload.as_ref()),
                                "evolve panicked; member kept"
                            );
                            None
                        }
                    };
                    let _ = updates.send(Update {
                        epoch,
                        slot,
                        parent,
                        child,
                    });
                });
            match spawned {
                Ok(handle) => {
                    self.evaluators.push(handle);
                    self.pending += 1;
                }
                Err(e) => {
                    tracing::warn!(slot, error = %e, "failed to spawn evaluation; member kept");
                }
            }
        }

        if self.pending == 0 {
            tracing::error!(generation = epoch, "no evaluation could be started; population stalled");
            self.stalled = true;
        }
    }

    fn record(&mut self, update: Update<G>) {
        self.pending = self.pending.saturating_sub(1);
        let slot = update.slot;
        self.next[slot] = Some(update);
        if self.pending == 0 {
            self.turnover();
        }
    }

    /// Replaces the old generation with the new one.
    fn turnover(&mut self) {
        for handle in self.evaluators.drain(..) {
            if handle.join().is_err() {
                tracing::error!("evaluation thread panicked");
            }
        }

        let reserved: Vec<usize> = self
            .reservation
            .as_ref()
            .map(|r| r.slots.clone())
            .unwrap_or_default();

        for slot in 0..self.members.len() {
            let Some(Update {
                epoch,
                parent,
                child,
                ..
            }) = self.next[slot].take()
            else {
                continue;
            };
            let Some(child) = child else {
                continue;
            };

            let stale = epoch <= self.installed[slot] || reserved.contains(&slot);
            if stale {
                if !Arc::ptr_eq(&child, &parent) && !Arc::ptr_eq(&child, &self.members[slot]) {
                    self.release(&child);
                }
            } else if !Arc::ptr_eq(&child, &self.members[slot]) {
                let retired = std::mem::replace(&mut self.members[slot], child);
                self.release(&retired);
            }
        }

        self.completed += 1;
        tracing::debug!(
            generation = self.epoch,
            size = self.members.len(),
            "generation turnover"
        );

        if self.stopping {
            return;
        }
        if self.delay.is_zero() {
            self.breed();
        } else {
            self.timer = after(self.delay);
        }
    }

    fn release(&mut self, genome: &Arc<G>) {
        if let Err(e) = genome.close() {
            tracing::warn!(error = %e, "genome release failed");
            self.failures.push(e);
        }
    }

    fn finish(mut self) {
        let reserved: Vec<usize> = self
            .reservation
            .take()
            .map(|r| r.slots)
            .unwrap_or_default();
        let members = std::mem::take(&mut self.members);
        for (slot, member) in members.iter().enumerate() {
            if !reserved.contains(&slot) {
                self.release(member);
            }
        }
        tracing::debug!(generations = self.completed, "generational population stopped");
        if let Some(reply) = self.shutdown_reply.take() {
            let _ = reply.send(std::mem::take(&mut self.failures));
        }
    }
}
