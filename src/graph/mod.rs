//! Graph (diffusion) populations.
//!
//! Each member of a [`Graph`] lives in its own [`Node`]: a slot that evolves
//! continuously, choosing its mates among the node's neighbors in a
//! [`Topology`]. There is no generation barrier; the population is a set of
//! loosely coupled, concurrently running evolution loops.
//!
//! # Key Types
//!
//! - [`Graph`]: the population; also a [`Genome`](crate::Genome), so graphs
//!   of populations form island models
//! - [`Topology`]: ring, grid, hypercube, or custom adjacency list
//! - [`GraphConfig`]: delay between evolutions and suitor count
//! - [`Node`]: one concurrently evolving slot
//!
//! # Threads
//!
//! Every node runs an actor thread that owns its genome and a worker thread
//! that runs `evolve`. Closing the graph halts all nodes first and only then
//! shuts them down, so in-flight evolutions can still read their peers.
//!
//! # References
//!
//! - Alba & Tomassini (2002), "Parallelism and Evolutionary Algorithms"
//! - Whitley, Rana & Heckendorn (1999), "The Island Model Genetic
//!   Algorithm: On Separability, Population Size and Convergence"

mod config;
mod node;
mod population;
mod topology;

pub use config::GraphConfig;
pub use node::Node;
pub use population::Graph;
pub use topology::Topology;
