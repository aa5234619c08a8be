//! Generational population configuration.

use crate::error::{EvoError, EvoResult};
use std::time::Duration;

/// Configuration for a [`Generational`](super::Generational) population.
///
/// # Defaults
///
/// ```
/// use std::time::Duration;
/// use u_evo::generational::GenerationalConfig;
///
/// let config = GenerationalConfig::default();
/// assert_eq!(config.delay, Duration::ZERO);
/// assert_eq!(config.migration_size, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationalConfig {
    /// Pause between the end of one generation and the start of the next.
    pub delay: Duration,

    /// Number of members exchanged per migration.
    ///
    /// Capped by the size of both populations taking part.
    pub migration_size: usize,
}

impl Default for GenerationalConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            migration_size: 1,
        }
    }
}

impl GenerationalConfig {
    /// Sets the delay between generations.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the number of members exchanged per migration.
    pub fn with_migration_size(mut self, n: usize) -> Self {
        self.migration_size = n;
        self
    }

    /// Validates configuration parameters.
    pub fn validate(&self) -> EvoResult<()> {
        if self.migration_size == 0 {
            return Err(EvoError::InvalidConfig(
                "migration_size must be at least 1".into(),
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
        assert!(GenerationalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_migration_size_invalid() {
        let config = GenerationalConfig::default().with_migration_size(0);
        assert!(matches!(config.validate(), Err(EvoError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_chain() {
        let config = GenerationalConfig::default()
            .with_delay(Duration::from_millis(7))
            .with_migration_size(3);
        assert_eq!(config.delay, Duration::from_millis(7));
        assert_eq!(config.migration_size, 3);
    }
}
