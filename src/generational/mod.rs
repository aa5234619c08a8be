//! Generational populations.
//!
//! A [`Generational`] population evolves all of its members in lockstep:
//! every member is evolved once per generation against the whole current
//! generation, and the new generation replaces the old one only when every
//! member is done. This is textbook master-slave parallelism.
//!
//! # Key Types
//!
//! - [`Generational`]: the population; also a [`Genome`](crate::Genome)
//! - [`GenerationalConfig`]: delay between generations and migration size
//! - [`Phase`]: lifecycle state
//!
//! # Migration
//!
//! When generational populations are placed in another population (for
//! example a [`Graph`](crate::graph::Graph)), their `evolve` exchanges
//! members between islands. A migration reserves slots on both sides, then
//! fills each side with the other's emigrants. Neither side is locked while
//! the other is addressed, and a busy counterpart aborts the exchange.
//!
//! # References
//!
//! - Cantú-Paz (1998), "A Survey of Parallel Genetic Algorithms"

mod config;
mod control;
mod population;
mod types;

pub use config::GenerationalConfig;
pub use population::Generational;
pub use types::Phase;
