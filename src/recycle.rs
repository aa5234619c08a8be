//! Explicit buffer reuse.
//!
//! Genomes that carry large vectors (permutations, real vectors) can hand
//! their buffer back to a [`Recycler`] from [`Genome::close`](crate::Genome::close)
//! and take it again in `evolve`, instead of allocating a fresh one for
//! every child.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Default number of idle buffers kept per length.
pub const DEFAULT_CAPACITY: usize = 64;

/// A thread-safe free-list of `Vec<T>` buffers keyed by length.
///
/// # Examples
///
/// ```
/// use u_evo::recycle::Recycler;
///
/// let recycler: Recycler<u32> = Recycler::new();
/// let mut buf = recycler.take(8);
/// buf.extend(0..8);
/// recycler.give(buf);
///
/// let again = recycler.take(8);
/// assert!(again.is_empty());
/// assert!(again.capacity() >= 8);
/// assert_eq!(recycler.idle(8), 0);
/// ```
pub struct Recycler<T> {
    capacity: usize,
    free: Mutex<HashMap<usize, Vec<Vec<T>>>>,
}

impl<T> Recycler<T> {
    /// Creates a recycler that keeps up to [`DEFAULT_CAPACITY`] buffers per
    /// length.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a recycler that keeps up to `capacity` buffers per length.
    /// Buffers given beyond that are dropped.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            free: Mutex::new(HashMap::new()),
        }
    }

    /// Returns an empty buffer with capacity for at least `len` elements.
    ///
    /// Reuses a buffer previously given back for the same length when one
    /// is available.
    pub fn take(&self, len: usize) -> Vec<T> {
        let reused = self.free.lock().get_mut(&len).and_then(Vec::pop);
        match reused {
            Some(buf) => buf,
            None => Vec::with_capacity(len),
        }
    }

    /// Hands a buffer back. It is filed under its current length and
    /// cleared.
    pub fn give(&self, mut buf: Vec<T>) {
        let len = buf.len();
        if len == 0 {
            return;
        }
        buf.clear();
        let mut free = self.free.lock();
        let list = free.entry(len).or_default();
        if list.len() < self.capacity {
            list.push(buf);
        }
    }

    /// Number of idle buffers filed under `len`.
    pub fn idle(&self, len: usize) -> usize {
        self.free.lock().get(&len).map_or(0, Vec::len)
    }
}

impl<T> Default for Recycler<T> {
    fn default() -> Self {
        Self::new()
    }
}
