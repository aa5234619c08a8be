//! Error types for u-evo.
//!
//! Three kinds of failure exist:
//!
//! - **Configuration errors** (malformed topology, invalid pool sizes,
//!   out-of-range config values) are fatal and surface from constructors.
//! - **Release errors** come from [`Genome::close`](crate::Genome::close).
//!   They never abort a shutdown; populations collect them and report them
//!   once from their own `close`.
//! - **Hand-off errors** ([`EvoError::Busy`], [`EvoError::Closed`]) are
//!   returned by operations on slots that are pinned by a migration or
//!   already shut down.

use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type EvoResult<T> = Result<T, EvoError>;

/// Error type for population construction, hand-offs, and shutdown.
#[derive(Debug, Error)]
pub enum EvoError {
    /// A population needs at least one member.
    #[error("population must contain at least one genome")]
    EmptyPopulation,

    /// The topology and the initial values disagree on the population size.
    #[error("topology has {layout} nodes but {values} genomes were supplied")]
    SizeMismatch { layout: usize, values: usize },

    /// An adjacency list refers to a node that does not exist.
    #[error("node {node} lists neighbor {neighbor}, but the population has {size} nodes")]
    NeighborOutOfRange {
        node: usize,
        neighbor: usize,
        size: usize,
    },

    /// Invalid selection pool parameters.
    #[error("invalid selection pool (mu = {mu}, lambda = {lambda}, rounds = {rounds}): {reason}")]
    InvalidPool {
        mu: usize,
        lambda: usize,
        rounds: usize,
        reason: &'static str,
    },

    /// Invalid population configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A genome failed to release its resources.
    #[error("genome release failed: {0}")]
    Release(String),

    /// Release failures collected while shutting down a population.
    #[error("{} release failure(s) during shutdown", .0.len())]
    Shutdown(Vec<EvoError>),

    /// The slot is pinned by a migration in progress.
    #[error("slot is held by a migration in progress")]
    Busy,

    /// The node, population, or pool has been closed.
    #[error("already closed")]
    Closed,

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl EvoError {
    /// Builds a [`EvoError::Release`] from any displayable cause.
    ///
    /// ```
    /// use u_evo::EvoError;
    ///
    /// let err = EvoError::release("file handle already gone");
    /// assert_eq!(err.to_string(), "genome release failed: file handle already gone");
    /// ```
    pub fn release(cause: impl fmt::Display) -> Self {
        EvoError::Release(cause.to_string())
    }

    /// Folds collected release failures into a single result.
    ///
    /// An empty list is success. Nested `Shutdown` errors are flattened so
    /// that island hierarchies report one flat list.
    pub fn from_failures(failures: Vec<EvoError>) -> EvoResult<()> {
        let mut flat = Vec::with_capacity(failures.len());
        for failure in failures {
            match failure {
                EvoError::Shutdown(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.is_empty() {
            Ok(())
        } else {
            Err(EvoError::Shutdown(flat))
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_from_failures_empty_is_ok() {
        assert!(EvoError::from_failures(Vec::new()).is_ok());
    }

    #[test]
    fn test_from_failures_flattens_nested() {
        let nested = EvoError::Shutdown(vec![EvoError::release("a"), EvoError::release("b")]);
        let result = EvoError::from_failures(vec![nested, EvoError::release("c")]);
        match result {
            Err(EvoError::Shutdown(all)) => assert_eq!(all.len(), 3),
            other => panic!("expected flattened shutdown error, got {other:?}"),
        }
    }

    #[test]
    fn test_display_messages() {
        let err = EvoError::NeighborOutOfRange {
            node: 2,
            neighbor: 9,
            size: 4,
        };
        assert_eq!(
            err.to_string(),
            "node 2 lists neighbor 9, but the population has 4 nodes"
        );
        assert_eq!(
            EvoError::Shutdown(vec![EvoError::Closed]).to_string(),
            "1 release failure(s) during shutdown"
        );
    }
}
