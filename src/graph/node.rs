//! Graph nodes.
//!
//! A [`Node`] manages one slot of a graph population. Its actor thread owns
//! the slot's genome exclusively and serves every read and write through a
//! request mailbox. A companion worker thread runs the evolutions, so the
//! actor stays responsive while user code runs.
//!
//! # Actor loop
//!
//! The actor waits on three sources at once:
//!
//! 1. requests from the node handle, the graph, and peer workers;
//! 2. completed evolutions from its worker;
//! 3. the delay timer that starts the next evolution.
//!
//! At most one evolution is in flight. A child is installed only if the slot
//! was neither overwritten nor claimed while it was being made; otherwise it
//! loses the race and is discarded.

use crate::error::{panic_message, EvoError, EvoResult};
use crate::genome::Genome;
use crossbeam_channel::{after, bounded, never, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::config::GraphConfig;

/// Proof of a migration claim on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClaimToken(u64);

pub(crate) enum Request<G> {
    Value {
        reply: Sender<Arc<G>>,
    },
    SetValue {
        value: Arc<G>,
        reply: Sender<EvoResult<()>>,
    },
    Claim {
        reply: Sender<EvoResult<(ClaimToken, Arc<G>)>>,
    },
    Install {
        token: ClaimToken,
        value: Arc<G>,
        reply: Sender<EvoResult<()>>,
    },
    Release {
        token: ClaimToken,
    },
    SetDelay(Duration),
    Halt {
        reply: Sender<()>,
    },
    Shutdown {
        reply: Sender<Vec<EvoError>>,
    },
}

/// The request channel of a node that has not started yet.
///
/// Graphs create every mailbox first so that each node can be started with
/// the addresses of its peers.
pub(crate) struct Mailbox<G> {
    tx: Sender<Request<G>>,
    rx: Receiver<Request<G>>,
}

impl<G> Mailbox<G> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub(crate) fn address(&self) -> Sender<Request<G>> {
        self.tx.clone()
    }
}

/// One concurrently evolving slot.
///
/// # Examples
///
/// A lone node evolves its genome against itself:
///
/// ```
/// use std::sync::Arc;
/// use u_evo::graph::{GraphConfig, Node};
/// use u_evo::Genome;
///
/// struct Counter(u32);
///
/// impl Genome for Counter {
///     fn fitness(&self) -> f64 { self.0 as f64 }
///     fn evolve(self: Arc<Self>, _suitors: &[Arc<Self>]) -> Arc<Self> {
///         Arc::new(Counter(self.0.saturating_add(1)))
///     }
/// }
///
/// let node = Node::new(Arc::new(Counter(0)), GraphConfig::default()).unwrap();
/// while node.value().unwrap().0 < 10 {}
/// node.close().unwrap();
/// assert!(node.value().is_err());
/// ```
pub struct Node<G: Genome> {
    index: usize,
    requests: Sender<Request<G>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<G: Genome> Node<G> {
    /// Starts a node with no peers. Each evolution is offered the node's
    /// own genome as sole suitor.
    pub fn new(value: Arc<G>, config: GraphConfig) -> EvoResult<Self> {
        config.validate()?;
        let mailbox = Mailbox::new();
        let peers = vec![mailbox.address()];
        Self::start(0, value, mailbox, peers, &config)
    }

    /// Spawns the actor and worker threads of node `index`.
    ///
    /// `peers` are the mailboxes of the nodes this one mates with. On
    /// failure the value has been released.
    pub(crate) fn start(
        index: usize,
        value: Arc<G>,
        mailbox: Mailbox<G>,
        peers: Vec<Sender<Request<G>>>,
        config: &GraphConfig,
    ) -> EvoResult<Self> {
        let suitor_count = config
            .suitor_count
            .map_or(peers.len(), |n| n.min(peers.len()));
        let (jobs_tx, jobs_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();

        let worker = Worker {
            index,
            jobs: jobs_rx,
            done: done_tx,
            peers,
            suitor_count,
        };
        let worker = match thread::Builder::new()
            .name(format!("u-evo-worker-{index}"))
            .spawn(move || worker.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                release(index, &value);
                return Err(EvoError::Spawn(e));
            }
        };

        let actor = Actor {
            index,
            current: value,
            requests: mailbox.rx,
            delay: config.delay,
            jobs: Some(jobs_tx),
            done: done_rx,
            timer: never(),
            in_flight: None,
            retired: None,
            overridden: false,
            claim: None,
            next_token: 0,
            stalled: false,
            halted: false,
            stopping: false,
            halt_replies: Vec::new(),
            shutdown_reply: None,
            failures: Vec::new(),
        };

        // The actor is handed over only once its thread exists, so a failed
        // spawn leaves it here to be released.
        let (hand_tx, hand_rx) = bounded::<Actor<G>>(1);
        let actor_thread = thread::Builder::new()
            .name(format!("u-evo-node-{index}"))
            .spawn(move || {
                if let Ok(actor) = hand_rx.recv() {
                    actor.run();
                }
            });
        let actor_thread = match actor_thread {
            Ok(handle) => handle,
            Err(e) => {
                release(index, &actor.current);
                // Dropping the actor disconnects the worker.
                drop(actor);
                let _ = worker.join();
                return Err(EvoError::Spawn(e));
            }
        };
        if hand_tx.send(actor).is_err() {
            // The receiving thread only exits after taking the actor.
            return Err(EvoError::Closed);
        }

        tracing::debug!(node = index, suitors = suitor_count, "node started");
        Ok(Self {
            index,
            requests: mailbox.tx,
            threads: Mutex::new(vec![actor_thread, worker]),
            closed: AtomicBool::new(false),
        })
    }

    /// Position of this node in its graph.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The current genome.
    ///
    /// Never waits for an evolution in progress. Fails with
    /// [`EvoError::Closed`] after the node shut down.
    pub fn value(&self) -> EvoResult<Arc<G>> {
        self.call(|reply| Request::Value { reply })
    }

    /// Replaces the current genome.
    ///
    /// An evolution in flight loses the race: its child is discarded. The
    /// displaced genome is released unless it is `value` itself. Fails with
    /// [`EvoError::Busy`] while a migration holds the slot.
    pub fn set_value(&self, value: Arc<G>) -> EvoResult<()> {
        self.call(|reply| Request::SetValue { value, reply })?
    }

    /// Sets the pause between successive evolutions.
    pub fn set_delay(&self, delay: Duration) -> EvoResult<()> {
        self.requests
            .send(Request::SetDelay(delay))
            .map_err(|_| EvoError::Closed)
    }

    /// Stops the node.
    ///
    /// Waits for the evolution in flight, releases the final genome, and
    /// joins both threads. Returns the release failures seen over the
    /// node's lifetime. Fails with [`EvoError::Closed`] if already closed.
    pub fn close(&self) -> EvoResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EvoError::Closed);
        }
        self.halt();
        EvoError::from_failures(self.shutdown()?)
    }

    /// Pins the current genome for a migration.
    pub(crate) fn claim(&self) -> EvoResult<(ClaimToken, Arc<G>)> {
        self.call(|reply| Request::Claim { reply })?
    }

    /// Replaces the pinned genome and drops the pin. The displaced genome
    /// now belongs to the claimant.
    pub(crate) fn install(&self, token: ClaimToken, value: Arc<G>) -> EvoResult<()> {
        self.call(|reply| Request::Install {
            token,
            value,
            reply,
        })?
    }

    /// Drops a pin without replacing the genome.
    pub(crate) fn release(&self, token: ClaimToken) {
        let _ = self.requests.send(Request::Release { token });
    }

    /// Stops launching evolutions and waits for the one in flight.
    ///
    /// The node keeps answering requests, so peers still evolving can read
    /// its value.
    pub(crate) fn halt(&self) {
        let _ = self.call(|reply| Request::Halt { reply });
    }

    /// Terminates the actor and joins the threads. Returns the collected
    /// release failures, or [`EvoError::Closed`] if another call got here
    /// first.
    pub(crate) fn shutdown(&self) -> EvoResult<Vec<EvoError>> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(EvoError::Closed);
        }
        let failures = self
            .call(|reply| Request::Shutdown { reply })
            .unwrap_or_default();

        let handles = std::mem::take(&mut *self.threads.lock());
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!(node = self.index, "node thread panicked");
            }
        }
        tracing::debug!(node = self.index, "node stopped");
        Ok(failures)
    }

    fn call<T>(&self, request: impl FnOnce(Sender<T>) -> Request<G>) -> EvoResult<T> {
        let (tx, rx) = bounded(1);
        self.requests
            .send(request(tx))
            .map_err(|_| EvoError::Closed)?;
        rx.recv().map_err(|_| EvoError::Closed)
    }
}

impl<G: Genome> Drop for Node<G> {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            self.halt();
            let failures = self.shutdown().unwrap_or_default();
            if !failures.is_empty() {
                tracing::warn!(
                    node = self.index,
                    failures = failures.len(),
                    "release failures dropped with unclosed node"
                );
            }
        }
    }
}

/// A completed evolution. `child` is `None` when `evolve` panicked.
struct Outcome<G> {
    parent: Arc<G>,
    child: Option<Arc<G>>,
}

enum Event<G> {
    Request(Option<Request<G>>),
    Done(Option<Outcome<G>>),
    Timer,
}

struct Actor<G: Genome> {
    index: usize,
    current: Arc<G>,
    requests: Receiver<Request<G>>,
    delay: Duration,
    jobs: Option<Sender<Arc<G>>>,
    done: Receiver<Outcome<G>>,
    timer: Receiver<Instant>,
    /// Parent of the evolution in flight.
    in_flight: Option<Arc<G>>,
    /// The in-flight parent after a write displaced it. Released once the
    /// evolution using it has returned.
    retired: Option<Arc<G>>,
    /// The slot was written while an evolution was in flight.
    overridden: bool,
    claim: Option<ClaimToken>,
    next_token: u64,
    /// `evolve` panicked; no further evolutions.
    stalled: bool,
    halted: bool,
    stopping: bool,
    halt_replies: Vec<Sender<()>>,
    shutdown_reply: Option<Sender<Vec<EvoError>>>,
    failures: Vec<EvoError>,
}

impl<G: Genome> Actor<G> {
    fn run(mut self) {
        self.schedule();
        loop {
            let event = select! {
                recv(self.requests) -> msg => Event::Request(msg.ok()),
                recv(self.done) -> msg => Event::Done(msg.ok()),
                recv(self.timer) -> _ => Event::Timer,
            };

            match event {
                Event::Request(Some(request)) => self.handle(request),
                Event::Request(None) => {
                    // Every handle is gone.
                    self.requests = never();
                    self.stop();
                }
                Event::Done(Some(outcome)) => self.complete(outcome),
                Event::Done(None) => {
                    self.done = never();
                    self.in_flight = None;
                    self.stalled = true;
                    self.settle_retired();
                }
                Event::Timer => {
                    self.timer = never();
                    self.launch();
                }
            }

            if self.in_flight.is_none() {
                for reply in self.halt_replies.drain(..) {
                    let _ = reply.send(());
                }
                if self.stopping {
                    break;
                }
            }
        }
        self.finish();
    }

    fn handle(&mut self, request: Request<G>) {
        match request {
            Request::Value { reply } => {
                let _ = reply.send(self.current.clone());
            }
            Request::SetValue { value, reply } => {
                if self.claim.is_some() {
                    let _ = reply.send(Err(EvoError::Busy));
                    return;
                }
                let displaced = std::mem::replace(&mut self.current, value);
                let parent_busy = self
                    .in_flight
                    .as_ref()
                    .is_some_and(|parent| Arc::ptr_eq(parent, &displaced));
                if !Arc::ptr_eq(&displaced, &self.current) {
                    if parent_busy {
                        self.retired = Some(displaced);
                    } else {
                        self.release(&displaced);
                    }
                }
                self.overridden = self.in_flight.is_some();
                let _ = reply.send(Ok(()));
            }
            Request::Claim { reply } => {
                let result = if self.claim.is_some() {
                    Err(EvoError::Busy)
                } else if self.halted {
                    Err(EvoError::Closed)
                } else {
                    let token = ClaimToken(self.next_token);
                    self.next_token += 1;
                    self.claim = Some(token);
                    Ok((token, self.current.clone()))
                };
                let _ = reply.send(result);
            }
            Request::Install {
                token,
                value,
                reply,
            } => {
                if self.claim != Some(token) {
                    let _ = reply.send(Err(EvoError::Busy));
                    return;
                }
                // The claimant adopts the displaced genome.
                self.current = value;
                self.claim = None;
                self.overridden = self.in_flight.is_some();
                let _ = reply.send(Ok(()));
            }
            Request::Release { token } => {
                if self.claim == Some(token) {
                    self.claim = None;
                }
            }
            Request::SetDelay(delay) => self.delay = delay,
            Request::Halt { reply } => {
                self.halted = true;
                self.timer = never();
                self.halt_replies.push(reply);
            }
            Request::Shutdown { reply } => {
                self.shutdown_reply = Some(reply);
                self.stop();
            }
        }
    }

    fn stop(&mut self) {
        self.halted = true;
        self.stopping = true;
        self.timer = never();
    }

    fn complete(&mut self, outcome: Outcome<G>) {
        self.in_flight = None;
        let Outcome { parent, child } = outcome;
        match child {
            None => {
                self.stalled = true;
            }
            Some(child) if self.overridden || self.claim.is_some() => {
                if !Arc::ptr_eq(&child, &parent) && !Arc::ptr_eq(&child, &self.current) {
                    self.release(&child);
                }
            }
            Some(child) => {
                if !Arc::ptr_eq(&child, &self.current) {
                    let prior = std::mem::replace(&mut self.current, child);
                    self.release(&prior);
                }
            }
        }
        self.overridden = false;
        self.settle_retired();
        self.schedule();
    }

    /// Releases a displaced parent whose evolution has returned, unless it
    /// was written back into the slot meanwhile.
    fn settle_retired(&mut self) {
        if let Some(retired) = self.retired.take() {
            if !Arc::ptr_eq(&retired, &self.current) {
                self.release(&retired);
            }
        }
    }

    /// Starts the next evolution now or arms the delay timer.
    fn schedule(&mut self) {
        if self.halted || self.stalled {
            return;
        }
        if self.delay.is_zero() {
            self.launch();
        } else {
            self.timer = after(self.delay);
        }
    }

    fn launch(&mut self) {
        if self.halted || self.stalled || self.in_flight.is_some() {
            return;
        }
        let sent = self
            .jobs
            .as_ref()
            .is_some_and(|jobs| jobs.send(self.current.clone()).is_ok());
        if sent {
            self.in_flight = Some(self.current.clone());
        } else {
            self.stalled = true;
        }
    }

    fn release(&mut self, genome: &Arc<G>) {
        if let Err(e) = genome.close() {
            tracing::warn!(node = self.index, error = %e, "genome release failed");
            self.failures.push(e);
        }
    }

    fn finish(mut self) {
        // Disconnects the worker.
        self.jobs = None;
        if self.claim.is_none() {
            let current = self.current.clone();
            self.release(&current);
        }
        let failures = std::mem::take(&mut self.failures);
        if let Some(reply) = self.shutdown_reply.take() {
            let _ = reply.send(failures);
        }
    }
}

/// Runs evolutions on behalf of one actor.
struct Worker<G> {
    index: usize,
    jobs: Receiver<Arc<G>>,
    done: Sender<Outcome<G>>,
    peers: Vec<Sender<Request<G>>>,
    suitor_count: usize,
}

impl<G: Genome> Worker<G> {
    fn run(self) {
        let mut rng = rand::rng();
        for parent in self.jobs.iter() {
            let suitors = self.suitors(&parent, &mut rng);
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                parent.clone().evolve(&suitors)
            }));
            let child = match result {
                Ok(child) => Some(child),
                Err(payload) => {
                    tracing::error!(
                        node = self.index,
                        panic = panic_message(payload.as_ref()),
                        "evolve panicked; node stalled"
                    );
                    None
                }
            };
            if self.done.send(Outcome { parent, child }).is_err() {
                break;
            }
        }
    }

    /// Reads a random subset of peer values. Peers that already shut down
    /// are skipped; with none left the parent is its own suitor.
    fn suitors<R: rand::Rng + ?Sized>(&self, parent: &Arc<G>, rng: &mut R) -> Vec<Arc<G>> {
        let mut suitors = Vec::with_capacity(self.suitor_count.max(1));
        for peer in self.peers.choose_multiple(rng, self.suitor_count) {
            let (tx, rx) = bounded(1);
            if peer.send(Request::Value { reply: tx }).is_ok() {
                if let Ok(value) = rx.recv() {
                    suitors.push(value);
                }
            }
        }
        if suitors.is_empty() {
            suitors.push(parent.clone());
        }
        suitors
    }
}

fn release<G: Genome>(index: usize, genome: &Arc<G>) {
    if let Err(e) = genome.close() {
        tracing::warn!(node = index, error = %e, "genome release failed");
    }
}
