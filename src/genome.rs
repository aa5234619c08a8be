//! Core capability traits.
//!
//! [`Genome`] is the contract between the population engines and
//! user-supplied candidate solutions. [`Population`] extends it, so that a
//! population can itself be placed inside another population: a graph of
//! generational populations is an island model.

use crate::error::EvoResult;
use crate::stats::Stats;
use std::cmp::Ordering;
use std::sync::Arc;

/// A candidate solution.
///
/// Genomes are shared as `Arc<Self>`. A population owns exactly one
/// reference per slot; suitors handed to [`evolve`](Genome::evolve) are
/// read-only snapshots of other slots.
///
/// # Contract
///
/// - `evolve` reads its arguments only. It returns either `self` (no
///   change) or a freshly made genome, never one of the suitors.
/// - `close` is called exactly once for every genome instance that is
///   discarded, and never for one that still occupies a slot. A suitor
///   snapshot may outlive the close of its original slot by the duration of
///   one `evolve` call; `close` must leave the value readable.
///
/// # Implementing
///
/// ```
/// use std::sync::Arc;
/// use u_evo::Genome;
///
/// struct Point(f64);
///
/// impl Genome for Point {
///     fn fitness(&self) -> f64 {
///         -self.0.abs()
///     }
///
///     fn evolve(self: Arc<Self>, suitors: &[Arc<Self>]) -> Arc<Self> {
///         let mate = suitors.iter().map(|s| s.0).sum::<f64>() / suitors.len() as f64;
///         let child = Arc::new(Point((self.0 + mate) / 2.0));
///         if child.fitness() > self.fitness() { child } else { self }
///     }
/// }
/// ```
pub trait Genome: Send + Sync + 'static {
    /// The function being maximized.
    ///
    /// For minimization problems, return the negated cost.
    fn fitness(&self) -> f64;

    /// Produces the replacement for this genome's slot.
    ///
    /// `suitors` is never empty: a slot without any peer is offered its
    /// own genome.
    fn evolve(self: Arc<Self>, suitors: &[Arc<Self>]) -> Arc<Self>
    where
        Self: Sized;

    /// Releases resources held by a discarded genome.
    fn close(&self) -> EvoResult<()> {
        Ok(())
    }

    /// Capability tag: `Some` when this genome is itself a population.
    fn as_population(&self) -> Option<&dyn Population> {
        None
    }
}

/// A collection of genomes that is itself a genome.
pub trait Population: Genome {
    /// Fitness statistics over every leaf genome, nested populations
    /// included. Never returns torn data while the population runs.
    fn stats(&self) -> Stats;

    /// Single-pass traversal over every leaf genome.
    fn iter(&self) -> Members;

    /// The leaf genome with the highest fitness, if any.
    fn fittest(&self) -> Option<Arc<dyn Genome>> {
        self.iter()
            .map(|g| (g.fitness(), g))
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
            .map(|(_, g)| g)
    }
}

/// Iterator over the leaf genomes of a population.
///
/// Values that are themselves populations are expanded in place, so the
/// iterator yields leaves of arbitrarily deep island hierarchies. The
/// traversal is sequential, single-pass, and not restartable.
pub struct Members {
    source: Box<dyn Iterator<Item = Arc<dyn Genome>> + Send>,
    nested: Option<Box<Members>>,
}

impl Members {
    /// Wraps a source of top-level values.
    pub fn new<I>(source: I) -> Self
    where
        I: Iterator<Item = Arc<dyn Genome>> + Send + 'static,
    {
        Self {
            source: Box::new(source),
            nested: None,
        }
    }

    /// A traversal that yields nothing.
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for Members {
    type Item = Arc<dyn Genome>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(nested) = self.nested.as_mut() {
                if let Some(leaf) = nested.next() {
                    return Some(leaf);
                }
                self.nested = None;
            }

            let value = self.source.next()?;
            match value.as_population() {
                Some(population) => self.nested = Some(Box::new(population.iter())),
                None => return Some(value),
            }
        }
    }
}

/// Statistics over a set of slot values, merging nested populations.
pub(crate) fn stats_of<'a, G, I>(values: I) -> Stats
where
    G: Genome,
    I: IntoIterator<Item = &'a Arc<G>>,
{
    let mut stats = Stats::new();
    for value in values {
        match value.as_population() {
            Some(population) => stats = stats.merge(&population.stats()),
            None => stats.insert(value.fitness()),
        }
    }
    stats
}

/// Upcasts slot values for a [`Members`] source.
pub(crate) fn leaves<G: Genome>(values: Vec<Arc<G>>) -> Members {
    Members::new(values.into_iter().map(|g| g as Arc<dyn Genome>))
}
