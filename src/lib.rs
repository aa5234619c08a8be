//! Concurrent population engines for evolutionary computation.
//!
//! The user supplies a genome type (a candidate solution with an evolve
//! operator, a fitness function, and a release hook); this crate runs it:
//!
//! - **Graph populations** ([`graph`]): every member lives in its own
//!   continuously evolving slot and mates with its neighbors in a ring,
//!   grid, hypercube, or custom topology. Good genomes diffuse through the
//!   graph.
//! - **Generational populations** ([`generational`]): all members evolve in
//!   lockstep against the whole current generation.
//! - **Selection** ([`sel`]): function selectors and bounded concurrent
//!   (μ, λ) selection pools shared by independent producers.
//! - **Statistics** ([`stats`]): streaming, mergeable fitness statistics.
//!
//! Populations are genomes themselves, so they nest: a graph of
//! generational populations is an island model, with migration performed by
//! the populations' own `evolve`.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use u_evo::graph::{Graph, GraphConfig};
//! use u_evo::{Genome, Population};
//!
//! /// Maximize the number of set bits.
//! struct OneMax(u64);
//!
//! impl Genome for OneMax {
//!     fn fitness(&self) -> f64 {
//!         self.0.count_ones() as f64
//!     }
//!
//!     fn evolve(self: Arc<Self>, suitors: &[Arc<Self>]) -> Arc<Self> {
//!         let bits = suitors.iter().fold(self.0, |acc, s| acc | s.0);
//!         let child = Arc::new(OneMax(bits));
//!         if child.fitness() > self.fitness() { child } else { self }
//!     }
//! }
//!
//! let seeds = (0..16).map(|i| Arc::new(OneMax(1 << (i * 4))));
//! let graph = Graph::hypercube(seeds, GraphConfig::default()).unwrap();
//! while graph.stats().max() < 16.0 {}
//! println!("{}", graph.stats());
//! graph.close().unwrap();
//! ```
//!
//! # Ownership
//!
//! Every genome instance is owned by exactly one slot. When a population
//! discards an instance it calls [`Genome::close`] on it exactly once;
//! genomes handed from one population to another by migration are adopted,
//! not closed. Closing a population closes all of its members, including
//! nested populations.
//!
//! # Logging
//!
//! Lifecycle events, migrations, release failures, and panics in user code
//! are reported through [`tracing`]. No subscriber is installed.

pub mod error;
pub mod generational;
pub mod genome;
pub mod graph;
pub mod recycle;
pub mod sel;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::{EvoError, EvoResult};
pub use genome::{Genome, Members, Population};
pub use stats::Stats;
