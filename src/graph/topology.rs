//! Graph layouts.
//!
//! A [`Topology`] is an adjacency list over node positions `0..len`. It is
//! computed once, validated, and never changes while a graph runs.

use crate::error::{EvoError, EvoResult};

/// Immutable adjacency list of a graph population.
///
/// # Examples
///
/// ```
/// use u_evo::graph::Topology;
///
/// let ring = Topology::ring(4).unwrap();
/// assert_eq!(ring.neighbors(0), &[3, 1]);
/// assert_eq!(ring.neighbors(3), &[2, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    adjacency: Vec<Vec<usize>>,
}

impl Topology {
    /// Each node is adjacent to its predecessor and successor.
    ///
    /// `neighbors(i) == [(i - 1) mod n, (i + 1) mod n]`
    pub fn ring(n: usize) -> EvoResult<Self> {
        ensure_nonempty(n)?;
        let adjacency = (0..n).map(|i| vec![(i + n - 1) % n, (i + 1) % n]).collect();
        Ok(Self { adjacency })
    }

    /// A one-dimensional array folded into a two-dimensional torus.
    ///
    /// `neighbors(i) == [i + 1, i - 1, i + n/2, i - n/2]`, all mod `n`.
    pub fn grid(n: usize) -> EvoResult<Self> {
        ensure_nonempty(n)?;
        let offset = n / 2;
        let adjacency = (0..n)
            .map(|i| {
                vec![
                    (i + 1) % n,
                    (i + n - 1) % n,
                    (i + offset) % n,
                    (i + n - offset) % n,
                ]
            })
            .collect();
        Ok(Self { adjacency })
    }

    /// Nodes differing in one bit of their position are adjacent.
    ///
    /// With `d = ceil(log2 n)`, `neighbors(i)[j] == (i ^ (1 << j)) mod n`
    /// for `j` in `0..d`. Sizes that are not a power of two wrap around.
    pub fn hypercube(n: usize) -> EvoResult<Self> {
        ensure_nonempty(n)?;
        let dimension = dimension(n);
        let adjacency = (0..n)
            .map(|i| (0..dimension).map(|j| (i ^ (1 << j)) % n).collect())
            .collect();
        Ok(Self { adjacency })
    }

    /// A caller-supplied adjacency list.
    ///
    /// `layout[i]` lists the neighbors of node `i`. Every index must be
    /// below `layout.len()`.
    pub fn custom(layout: Vec<Vec<usize>>) -> EvoResult<Self> {
        let size = layout.len();
        ensure_nonempty(size)?;
        for (node, neighbors) in layout.iter().enumerate() {
            if let Some(&neighbor) = neighbors.iter().find(|&&j| j >= size) {
                return Err(EvoError::NeighborOutOfRange {
                    node,
                    neighbor,
                    size,
                });
            }
        }
        Ok(Self { adjacency: layout })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Always `false`: constructors reject empty layouts.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Neighbors of node `i`, as listed.
    ///
    /// # Panics
    /// Panics if `i >= self.len()`.
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.adjacency[i]
    }

    /// The peers node `i` mates with: its neighbors without duplicates,
    /// excluding `i` itself unless it is the only neighbor.
    ///
    /// # Panics
    /// Panics if `i >= self.len()`.
    pub fn peers(&self, i: usize) -> Vec<usize> {
        let mut peers: Vec<usize> = Vec::with_capacity(self.adjacency[i].len());
        for &j in &self.adjacency[i] {
            if !peers.contains(&j) {
                peers.push(j);
            }
        }
        if peers.len() > 1 {
            peers.retain(|&j| j != i);
        }
        peers
    }

    /// The full adjacency list.
    pub fn adjacency(&self) -> &[Vec<usize>] {
        &self.adjacency
    }
}

fn ensure_nonempty(n: usize) -> EvoResult<()> {
    if n == 0 {
        Err(EvoError::EmptyPopulation)
    } else {
        Ok(())
    }
}

/// Smallest `d` with `2^d >= n`.
fn dimension(n: usize) -> usize {
    let mut d = 0;
    while (1usize << d) < n {
        d += 1;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_of_four() {
        let ring = Topology::ring(4).unwrap();
        for i in 0..4 {
            assert_eq!(
                ring.neighbors(i),
                &[(i + 3) % 4, (i + 1) % 4],
                "node {i}"
            );
        }
    }

    #[test]
    fn test_grid_offsets() {
        let grid = Topology::grid(8).unwrap();
        assert_eq!(grid.neighbors(0), &[1, 7, 4, 4]);
        assert_eq!(grid.neighbors(5), &[6, 4, 1, 1]);
        assert_eq!(grid.peers(0), vec![1, 7, 4]);
    }

    #[test]
    fn test_hypercube_power_of_two() {
        let cube = Topology::hypercube(8).unwrap();
        assert_eq!(cube.neighbors(0), &[1, 2, 4]);
        assert_eq!(cube.neighbors(5), &[4, 7, 1]);
    }

    #[test]
    fn test_hypercube_wraps_odd_sizes() {
        let cube = Topology::hypercube(5).unwrap();
        // d = 3; 4 ^ 4 = 0, 4 ^ 1 = 5 -> 0, 4 ^ 2 = 6 -> 1
        assert_eq!(cube.neighbors(4), &[0, 1, 0]);
        assert!(cube.adjacency().iter().flatten().all(|&j| j < 5));
    }

    #[test]
    fn test_single_node_layouts() {
        assert!(Topology::hypercube(1).unwrap().neighbors(0).is_empty());
        let ring = Topology::ring(1).unwrap();
        assert_eq!(ring.neighbors(0), &[0, 0]);
        assert_eq!(ring.peers(0), vec![0], "a lone node mates with itself");
    }

    #[test]
    fn test_peers_exclude_self_when_possible() {
        let topo = Topology::custom(vec![vec![0, 1, 1], vec![1]]).unwrap();
        assert_eq!(topo.peers(0), vec![1]);
        assert_eq!(topo.peers(1), vec![1]);
    }

    #[test]
    fn test_custom_out_of_range_rejected() {
        let err = Topology::custom(vec![vec![1], vec![0, 2]]).unwrap_err();
        assert!(matches!(
            err,
            EvoError::NeighborOutOfRange {
                node: 1,
                neighbor: 2,
                size: 2
            }
        ));
    }

    #[test]
    fn test_empty_layouts_rejected() {
        assert!(matches!(Topology::ring(0), Err(EvoError::EmptyPopulation)));
        assert!(matches!(Topology::grid(0), Err(EvoError::EmptyPopulation)));
        assert!(matches!(Topology::hypercube(0), Err(EvoError::EmptyPopulation)));
        assert!(matches!(Topology::custom(Vec::new()), Err(EvoError::EmptyPopulation)));
    }

    #[test]
    fn test_dimension() {
        assert_eq!(dimension(1), 0);
        assert_eq!(dimension(2), 1);
        assert_eq!(dimension(5), 3);
        assert_eq!(dimension(8), 3);
        assert_eq!(dimension(9), 4);
    }
}
