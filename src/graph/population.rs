//! Graph (diffusion) population.

use super::config::GraphConfig;
use super::node::{Mailbox, Node};
use super::topology::Topology;
use crate::error::{EvoError, EvoResult};
use crate::genome::{leaves, stats_of, Genome, Members, Population};
use crate::stats::Stats;
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A population whose members evolve concurrently against their neighbors
/// in a fixed graph.
///
/// Every node runs its own evolution loop, so good genomes diffuse through
/// the graph at the pace of their neighborhoods rather than in lockstep
/// generations.
///
/// A graph is itself a [`Genome`]: placed inside another population, its
/// `evolve` swaps one random member with one of a random peer graph
/// (migration), and its fitness is that of its best member.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_evo::graph::{Graph, GraphConfig};
/// use u_evo::{Genome, Population};
///
/// struct Bits(u32);
///
/// impl Genome for Bits {
///     fn fitness(&self) -> f64 { self.0.count_ones() as f64 }
///     fn evolve(self: Arc<Self>, suitors: &[Arc<Self>]) -> Arc<Self> {
///         let child = Arc::new(Bits(self.0 | suitors[0].0 | (self.0 << 1 & 0xff)));
///         if child.fitness() > self.fitness() { child } else { self }
///     }
/// }
///
/// let seeds = (0..8).map(|i| Arc::new(Bits(1 << i)));
/// let graph = Graph::ring(seeds, GraphConfig::default()).unwrap();
/// while graph.stats().max() < 8.0 {}
/// graph.close().unwrap();
/// ```
pub struct Graph<G: Genome> {
    topology: Topology,
    nodes: Vec<Node<G>>,
    closed: AtomicBool,
    /// Release failures from migrations, reported by `close`. Taken (left
    /// `None`) once `close` has collected them.
    failures: Mutex<Option<Vec<EvoError>>>,
}

impl<G: Genome> Graph<G> {
    /// Creates and starts a graph population.
    ///
    /// `values[i]` seeds node `i` of `topology`.
    ///
    /// # Errors
    ///
    /// - [`EvoError::EmptyPopulation`] if `values` is empty.
    /// - [`EvoError::SizeMismatch`] if the topology has a different size.
    /// - [`EvoError::InvalidConfig`] if `config` does not validate.
    /// - [`EvoError::Spawn`] if a node thread cannot be started. Every seed
    ///   has been released in that case.
    ///
    /// Configuration errors return before the population takes ownership:
    /// the seeds are dropped without being released.
    pub fn new<V>(topology: Topology, values: V, config: GraphConfig) -> EvoResult<Self>
    where
        V: IntoIterator<Item = Arc<G>>,
    {
        let values: Vec<Arc<G>> = values.into_iter().collect();
        if values.is_empty() {
            return Err(EvoError::EmptyPopulation);
        }
        if topology.len() != values.len() {
            return Err(EvoError::SizeMismatch {
                layout: topology.len(),
                values: values.len(),
            });
        }
        config.validate()?;

        let mailboxes: Vec<Mailbox<G>> = (0..values.len()).map(|_| Mailbox::new()).collect();
        let addresses: Vec<_> = mailboxes.iter().map(Mailbox::address).collect();

        let mut nodes: Vec<Node<G>> = Vec::with_capacity(values.len());
        let mut pending = mailboxes.into_iter().zip(values).enumerate();
        while let Some((i, (mailbox, value))) = pending.next() {
            let peers = topology
                .peers(i)
                .into_iter()
                .map(|j| addresses[j].clone())
                .collect();
            match Node::start(i, value, mailbox, peers, &config) {
                Ok(node) => nodes.push(node),
                Err(err) => {
                    for (_, (_, value)) in pending.by_ref() {
                        if let Err(e) = value.close() {
                            tracing::warn!(error = %e, "seed release failed");
                        }
                    }
                    drop(addresses);
                    for node in &nodes {
                        node.halt();
                    }
                    for node in &nodes {
                        let _ = node.shutdown();
                    }
                    return Err(err);
                }
            }
        }

        tracing::debug!(size = nodes.len(), "graph population started");
        Ok(Self {
            topology,
            nodes,
            closed: AtomicBool::new(false),
            failures: Mutex::new(Some(Vec::new())),
        })
    }

    /// Each node mates with its predecessor and successor.
    pub fn ring<V>(values: V, config: GraphConfig) -> EvoResult<Self>
    where
        V: IntoIterator<Item = Arc<G>>,
    {
        Self::with_layout(Topology::ring, values, config)
    }

    /// Nodes are laid out on a torus; see [`Topology::grid`].
    pub fn grid<V>(values: V, config: GraphConfig) -> EvoResult<Self>
    where
        V: IntoIterator<Item = Arc<G>>,
    {
        Self::with_layout(Topology::grid, values, config)
    }

    /// Nodes are laid out on a hypercube; see [`Topology::hypercube`].
    pub fn hypercube<V>(values: V, config: GraphConfig) -> EvoResult<Self>
    where
        V: IntoIterator<Item = Arc<G>>,
    {
        Self::with_layout(Topology::hypercube, values, config)
    }

    /// Nodes are laid out by an explicit adjacency list.
    pub fn custom<V>(layout: Vec<Vec<usize>>, values: V, config: GraphConfig) -> EvoResult<Self>
    where
        V: IntoIterator<Item = Arc<G>>,
    {
        Self::new(Topology::custom(layout)?, values, config)
    }

    fn with_layout<V>(
        layout: fn(usize) -> EvoResult<Topology>,
        values: V,
        config: GraphConfig,
    ) -> EvoResult<Self>
    where
        V: IntoIterator<Item = Arc<G>>,
    {
        let values: Vec<Arc<G>> = values.into_iter().collect();
        let topology = layout(values.len())?;
        Self::new(topology, values, config)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: empty graphs cannot be built.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The layout this graph was built with.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Whether [`close`](Genome::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// A point-in-time copy of every node's genome. Nodes already shut
    /// down are skipped.
    pub fn values(&self) -> Vec<Arc<G>> {
        self.nodes.iter().filter_map(|n| n.value().ok()).collect()
    }

    /// Sets the pause between successive evolutions of every node.
    pub fn set_delay(&self, delay: Duration) {
        for node in &self.nodes {
            let _ = node.set_delay(delay);
        }
    }

    /// Swaps the genomes of one random node in each graph.
    ///
    /// Both displaced genomes are adopted by their new nodes; nothing is
    /// released and both graphs keep their size. Returns `false` without
    /// changing anything when either node is held by another migration or
    /// shut down.
    pub fn migrate(&self, other: &Graph<G>) -> bool {
        let mut rng = rand::rng();
        let here = &self.nodes[rng.random_range(0..self.nodes.len())];
        let there = &other.nodes[rng.random_range(0..other.nodes.len())];

        let (here_token, x) = match here.claim() {
            Ok(claim) => claim,
            Err(e) => {
                tracing::debug!(node = here.index(), error = %e, "migration skipped");
                return false;
            }
        };
        let (there_token, y) = match there.claim() {
            Ok(claim) => claim,
            Err(e) => {
                here.release(here_token);
                tracing::debug!(node = there.index(), error = %e, "migration skipped");
                return false;
            }
        };

        if here.install(here_token, y).is_err() {
            // `here` shut down while pinned and left `x` to us; `y` stays put.
            there.release(there_token);
            self.orphan(&x);
            return false;
        }
        if there.install(there_token, x.clone()).is_err() {
            // `y` already lives here; `x` has no slot left.
            self.orphan(&x);
            return false;
        }

        tracing::debug!(from = here.index(), to = there.index(), "migration performed");
        true
    }

    fn orphan(&self, genome: &Arc<G>) {
        tracing::warn!("migration counterpart closed; releasing orphaned genome");
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

impl<G: Genome> Genome for Graph<G> {
    /// Fitness of the best member.
    fn fitness(&self) -> f64 {
        self.stats().max()
    }

    /// Migrates one genome with a random other graph among `suitors`.
    fn evolve(self: Arc<Self>, suitors: &[Arc<Self>]) -> Arc<Self> {
        let others: Vec<&Arc<Self>> = suitors.iter().filter(|s| !Arc::ptr_eq(s, &self)).collect();
        if let Some(other) = others.choose(&mut rand::rng()) {
            self.migrate(other);
        }
        self
    }

    /// Stops every node and releases every member.
    ///
    /// All nodes are halted before any is shut down, so evolutions still in
    /// flight can read their peers. Calls after the first return `Ok(())`.
    fn close(&self) -> EvoResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for node in &self.nodes {
            node.halt();
        }
        let mut failures = Vec::new();
        for node in &self.nodes {
            failures.extend(node.shutdown().unwrap_or_default());
        }
        failures.extend(self.failures.lock().take().unwrap_or_default());
        tracing::debug!(
            size = self.nodes.len(),
            failures = failures.len(),
            "graph population closed"
        );
        EvoError::from_failures(failures)
    }

    fn as_population(&self) -> Option<&dyn Population> {
        Some(self)
    }
}

impl<G: Genome> Population for Graph<G> {
    fn stats(&self) -> Stats {
        stats_of(&self.values())
    }

    fn iter(&self) -> Members {
        leaves(self.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{Behavior, Ledger, Probe};
    use std::collections::HashSet;
    use std::thread;
    use std::time::Instant;

    fn probes(n: usize, behavior: Behavior, ledger: &Arc<Ledger>) -> Vec<Arc<Probe>> {
        (0..n)
            .map(|i| Probe::with_ledger(i as f64, behavior, ledger))
            .collect()
    }

    fn ids(graph: &Graph<Probe>) -> HashSet<u64> {
        graph.values().iter().map(|p| p.id).collect()
    }

    // ---- Construction ----

    #[test]
    fn test_size_mismatch_rejected() {
        let topology = Topology::ring(3).unwrap();
        let values = vec![Probe::new(1.0), Probe::new(2.0)];
        assert!(matches!(
            Graph::new(topology, values, GraphConfig::default()),
            Err(EvoError::SizeMismatch { layout: 3, values: 2 })
        ));
    }

    #[test]
    fn test_empty_rejected() {
        let values: Vec<Arc<Probe>> = Vec::new();
        assert!(matches!(
            Graph::ring(values, GraphConfig::default()),
            Err(EvoError::EmptyPopulation)
        ));
    }

    #[test]
    fn test_bad_layout_rejected() {
        let values = vec![Probe::new(1.0), Probe::new(2.0)];
        assert!(matches!(
            Graph::custom(vec![vec![1], vec![5]], values, GraphConfig::default()),
            Err(EvoError::NeighborOutOfRange { node: 1, neighbor: 5, .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let values = vec![Probe::new(1.0)];
        let config = GraphConfig::default().with_suitor_count(0);
        assert!(matches!(
            Graph::ring(values, config),
            Err(EvoError::InvalidConfig(_))
        ));
    }

    // ---- Running ----

    #[test]
    fn test_ring_diffuses_and_closes_everything_once() {
        let ledger = Ledger::new();
        let graph = Graph::ring(probes(6, Behavior::Climb, &ledger), GraphConfig::default()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while graph.stats().min() < 30.0 {
            assert!(Instant::now() < deadline, "population did not improve");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(graph.stats().count(), 6);
        graph.close().unwrap();
        assert!(ledger.all_closed_once(), "double: {:?}", ledger.double_closed());
    }

    #[test]
    fn test_limited_suitors() {
        let ledger = Ledger::new();
        let config = GraphConfig::default().with_suitor_count(1);
        let graph = Graph::hypercube(probes(8, Behavior::Climb, &ledger), config).unwrap();
        thread::sleep(Duration::from_millis(20));
        graph.close().unwrap();
        assert!(ledger.all_closed_once(), "double: {:?}", ledger.double_closed());
    }

    #[test]
    fn test_fittest_and_iter() {
        let graph = Graph::grid(
            vec![Probe::new(1.0), Probe::new(7.0), Probe::new(3.0), Probe::new(5.0)],
            GraphConfig::default(),
        )
        .unwrap();
        assert_eq!(graph.fittest().unwrap().fitness(), 7.0);
        assert_eq!(graph.iter().count(), 4);
        assert_eq!(graph.fitness(), 7.0);
        graph.close().unwrap();
    }

    #[test]
    fn test_close_idempotent_and_reports_failures() {
        let ledger = Ledger::new();
        let values = vec![
            Probe::failing(1.0, &ledger),
            Probe::with_ledger(2.0, Behavior::Stay, &ledger),
        ];
        let graph = Graph::ring(values, GraphConfig::default()).unwrap();
        match graph.close() {
            Err(EvoError::Shutdown(failures)) => assert_eq!(failures.len(), 1),
            other => panic!("expected shutdown failures, got {other:?}"),
        }
        assert!(graph.close().is_ok());
        assert!(graph.is_closed());
        assert_eq!(graph.stats().count(), 0);
        assert!(ledger.all_closed_once());
    }

    // ---- Migration ----

    #[test]
    fn test_migration_preserves_counts_and_releases_nothing() {
        let ledger = Ledger::new();
        let a = Graph::ring(probes(4, Behavior::Stay, &ledger), GraphConfig::default()).unwrap();
        let b = Graph::ring(probes(4, Behavior::Stay, &ledger), GraphConfig::default()).unwrap();
        let before: HashSet<u64> = ids(&a).union(&ids(&b)).copied().collect();

        let mut swaps = 0;
        for _ in 0..20 {
            if a.migrate(&b) {
                swaps += 1;
            }
        }
        assert!(swaps > 0);
        assert_eq!(ledger.closed(), 0, "no displaced genome is released");
        assert_eq!(a.len(), 4);
        assert_eq!(b.stats().count(), 4);
        let after: HashSet<u64> = ids(&a).union(&ids(&b)).copied().collect();
        assert_eq!(before, after);

        a.close().unwrap();
        b.close().unwrap();
        assert!(ledger.all_closed_once(), "double: {:?}", ledger.double_closed());
    }

    #[test]
    fn test_migration_with_closed_counterpart_is_skipped() {
        let ledger = Ledger::new();
        let a = Graph::ring(probes(2, Behavior::Stay, &ledger), GraphConfig::default()).unwrap();
        let b = Graph::ring(probes(2, Behavior::Stay, &ledger), GraphConfig::default()).unwrap();
        b.close().unwrap();
        assert!(!a.migrate(&b));
        a.close().unwrap();
        assert!(ledger.all_closed_once());
    }

    #[test]
    fn test_orphan_failures_reported_by_close_only_once() {
        let ledger = Ledger::new();
        let graph = Graph::ring(probes(2, Behavior::Stay, &ledger), GraphConfig::default()).unwrap();
        graph.orphan(&Probe::failing(1.0, &ledger));
        match graph.close() {
            Err(EvoError::Shutdown(failures)) => assert_eq!(failures.len(), 1),
            other => panic!("expected the orphan failure, got {other:?}"),
        }

        // Late failures are logged; there is no close left to report them.
        let late = Probe::failing(2.0, &ledger);
        graph.orphan(&late);
        assert_eq!(late.closes(), 1);
        assert!(graph.close().is_ok());
    }

    #[test]
    fn test_evolve_without_other_graph_returns_self() {
        let graph = Arc::new(Graph::ring(vec![Probe::new(1.0)], GraphConfig::default()).unwrap());
        let same = graph.clone().evolve(&[graph.clone()]);
        assert!(Arc::ptr_eq(&same, &graph));
        graph.close().unwrap();
    }

    #[test]
    fn test_nested_graph_stats_and_close() {
        let ledger = Ledger::new();
        let islands: Vec<Arc<Graph<Probe>>> = (0..3)
            .map(|_| {
                let island =
                    Graph::ring(probes(3, Behavior::Climb, &ledger), GraphConfig::default());
                Arc::new(island.unwrap())
            })
            .collect();
        let world = Graph::ring(islands, GraphConfig::default()).unwrap();

        thread::sleep(Duration::from_millis(30));
        let stats = world.stats();
        assert_eq!(stats.count(), 9, "stats merge every island");
        assert_eq!(world.iter().count(), 9);

        world.close().unwrap();
        assert!(ledger.all_closed_once(), "double: {:?}", ledger.double_closed());
    }
}
