//! Generational population state.

use std::fmt;

/// Lifecycle state of a [`Generational`](super::Generational) population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Between generations, waiting for the delay to elapse.
    AwaitingGeneration,

    /// Members are being evolved.
    Evolving,

    /// A migration holds a reservation on some members. Generations keep
    /// running underneath.
    Migrating,

    /// Shut down. Terminal.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::AwaitingGeneration => "awaiting generation",
            Phase::Evolving => "evolving",
            Phase::Migrating => "migrating",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}
