//! Graph population configuration.
//!
//! [`GraphConfig`] holds the parameters shared by every node of a
//! [`Graph`](super::Graph).

use crate::error::{EvoError, EvoResult};
use std::time::Duration;

/// Configuration for a graph (diffusion) population.
///
/// # Defaults
///
/// ```
/// use std::time::Duration;
/// use u_evo::graph::GraphConfig;
///
/// let config = GraphConfig::default();
/// assert_eq!(config.delay, Duration::ZERO);
/// assert_eq!(config.suitor_count, None);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use std::time::Duration;
/// use u_evo::graph::GraphConfig;
///
/// let config = GraphConfig::default()
///     .with_delay(Duration::from_millis(5))
///     .with_suitor_count(2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphConfig {
    /// Pause between successive evolutions of a node.
    ///
    /// Zero (the default) evolves continuously.
    pub delay: Duration,

    /// Number of peers offered to each evolution, drawn uniformly at random
    /// from the node's neighbors.
    ///
    /// `None` offers every neighbor. A value above the neighbor count is
    /// capped.
    pub suitor_count: Option<usize>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            suitor_count: None,
        }
    }
}

impl GraphConfig {
    /// Sets the delay between evolutions.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the number of suitors per evolution.
    pub fn with_suitor_count(mut self, n: usize) -> Self {
        self.suitor_count = Some(n);
        self
    }

    /// Offers every neighbor to each evolution (the default).
    pub fn with_all_suitors(mut self) -> Self {
        self.suitor_count = None;
        self
    }

    /// Validates configuration parameters.
    pub fn validate(&self) -> EvoResult<()> {
        if self.suitor_count == Some(0) {
            return Err(EvoError::InvalidConfig(
                "suitor_count must be at least 1 or None".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GraphConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_suitors_invalid() {
        let config = GraphConfig::default().with_suitor_count(0);
        assert!(matches!(config.validate(), Err(EvoError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_chain() {
        let config = GraphConfig::default()
            .with_delay(Duration::from_millis(3))
            .with_suitor_count(4)
            .with_all_suitors();
        assert_eq!(config.delay, Duration::from_millis(3));
        assert_eq!(config.suitor_count, None);
    }
}
