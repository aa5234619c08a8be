//! Streaming fitness statistics.
//!
//! [`Stats`] keeps sufficient statistics (count, mean, sum of squared
//! deviations, min, max) so that values can be inserted one at a time and
//! independently built accumulators can be combined without re-scanning the
//! raw values. Populations compute their statistics concurrently per
//! sub-population and merge the results.
//!
//! # References
//!
//! - Welford (1962), "Note on a Method for Calculating Corrected Sums of
//!   Squares and Products"
//! - Chan, Golub & LeVeque (1979), "Updating Formulae and a Pairwise
//!   Algorithm for Computing Sample Variances"

use std::fmt;

/// Online, mergeable statistics over a stream of `f64` values.
///
/// All derived quantities (variance, standard deviation, ...) are computed
/// on demand. Variance is the **population** variance.
///
/// An empty accumulator reports `count() == 0` and `NaN` for every other
/// quantity.
///
/// # Examples
///
/// ```
/// use u_evo::Stats;
///
/// let low: Stats = (0..5).map(f64::from).collect();
/// let high: Stats = (5..10).map(f64::from).collect();
/// let all = low.merge(&high);
///
/// assert_eq!(all.count(), 10);
/// assert!((all.mean() - 4.5).abs() < 1e-12);
/// assert!((all.variance() - 8.25).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the mean.
    m2: f64,
    min: f64,
    max: f64,
}

impl Stats {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a single value (Welford's update).
    ///
    /// # Complexity
    /// O(1)
    pub fn insert(&mut self, x: f64) {
        if self.count == 0 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }

        let n = self.count as f64;
        let new_n = n + 1.0;
        let delta = x - self.mean;
        self.mean += delta / new_n;
        self.m2 += delta * delta * (n / new_n);
        self.count += 1;
    }

    /// Combines two independently built accumulators (Chan et al.).
    ///
    /// Merging with an empty accumulator returns the other operand unchanged.
    ///
    /// # Complexity
    /// O(1)
    pub fn merge(&self, other: &Stats) -> Stats {
        if other.count == 0 {
            return *self;
        }
        if self.count == 0 {
            return *other;
        }

        let a = self.count as f64;
        let b = other.count as f64;
        let n = a + b;
        let delta = other.mean - self.mean;

        Stats {
            count: self.count + other.count,
            mean: self.mean + delta * (b / n),
            m2: self.m2 + other.m2 + delta * delta * (a * b / n),
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Number of values inserted.
    pub fn count(&self) -> usize {
        self.count as usize
    }

    /// Whether no value has been inserted.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Largest value seen.
    pub fn max(&self) -> f64 {
        if self.is_empty() {
            f64::NAN
        } else {
            self.max
        }
    }

    /// Smallest value seen.
    pub fn min(&self) -> f64 {
        if self.is_empty() {
            f64::NAN
        } else {
            self.min
        }
    }

    /// Difference between the largest and smallest values.
    pub fn range(&self) -> f64 {
        self.max() - self.min()
    }

    /// Arithmetic mean.
    pub fn mean(&self) -> f64 {
        if self.is_empty() {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.is_empty() {
            f64::NAN
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Population standard deviation.
    pub fn sd(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Relative standard deviation, `sd / mean`.
    pub fn rsd(&self) -> f64 {
        self.sd() / self.mean()
    }
}

impl Extend<f64> for Stats {
    fn extend<T: IntoIterator<Item = f64>>(&mut self, iter: T) {
        for x in iter {
            self.insert(x);
        }
    }
}

impl FromIterator<f64> for Stats {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        let mut stats = Stats::new();
        stats.extend(iter);
        stats
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Max: {:.6} | Min: {:.6} | SD: {:.6}",
            self.max(),
            self.min(),
            self.sd()
        )
    }
}
