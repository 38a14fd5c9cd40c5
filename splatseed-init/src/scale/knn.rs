//! Exact k-nearest-neighbor search over a fixed point set.

use glam::DVec3;
use kiddo::{KdTree, SquaredEuclidean};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Point counts up to this use brute force under [`KnnBackend::Auto`].
pub const AUTO_BRUTE_FORCE_LIMIT: usize = 2048;
/// Leaf capacity of the kiddo tree. A full leaf whose points all share one
/// value on the split axis cannot be split.
pub const KD_TREE_BUCKET_SIZE: usize = 32;

/// A neighbor of a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// Exact nearest-neighbor queries against the indexed point set.
pub trait NeighborSearch {
    /// The `k` nearest neighbors of point `query`, excluding the point itself,
    /// ordered by distance and then by index.
    fn nearest(&self, query: usize, k: usize) -> Vec<Neighbor>;
}

fn by_distance_then_index(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.index.cmp(&b.index))
}

/// Linear scan; O(N) per query.
pub struct BruteForceSearch<'a> {
    positions: &'a [DVec3],
}

impl<'a> BruteForceSearch<'a> {
    pub fn new(positions: &'a [DVec3]) -> Self {
        Self { positions }
    }
}

impl NeighborSearch for BruteForceSearch<'_> {
    fn nearest(&self, query: usize, k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let origin = self.positions[query];
        let mut best: Vec<Neighbor> = Vec::with_capacity(k + 1);

        for (index, p) in self.positions.iter().enumerate() {
            if index == query {
                continue;
            }
            let candidate = Neighbor {
                index,
                distance: origin.distance(*p),
            };
            if best.len() == k && by_distance_then_index(&candidate, &best[k - 1]).is_ge() {
                continue;
            }
            let at = best.partition_point(|n| by_distance_then_index(n, &candidate).is_lt());
            best.insert(at, candidate);
            best.truncate(k);
        }
        best
    }
}

/// Bit pattern of a coordinate with `-0.0` folded into `0.0`.
pub(crate) fn coordinate_key(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

/// Largest number of points sharing one coordinate value on any axis.
fn max_repeated_coordinate(positions: &[DVec3]) -> usize {
    (0..3)
        .map(|axis| {
            let mut keys: Vec<u64> = positions.iter().map(|p| coordinate_key(p[axis])).collect();
            keys.sort_unstable();
            keys.chunk_by(|a, b| a == b).map(<[u64]>::len).max().unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

/// k-d tree backed search.
///
/// Candidates from the tree are re-measured with the same metric as
/// [`BruteForceSearch`] so both backends yield identical distances.
pub struct KdTreeSearch<'a> {
    positions: &'a [DVec3],
    tree: KdTree<f64, 3>,
}

impl<'a> KdTreeSearch<'a> {
    /// Build the tree, or `None` when [`KD_TREE_BUCKET_SIZE`] or more points
    /// share a coordinate value on some axis.
    pub fn try_new(positions: &'a [DVec3]) -> Option<Self> {
        if max_repeated_coordinate(positions) >= KD_TREE_BUCKET_SIZE {
            return None;
        }
        let mut tree: KdTree<f64, 3> = KdTree::new();
        for (idx, pos) in positions.iter().enumerate() {
            tree.add(&pos.to_array(), idx as u64);
        }
        Some(Self { positions, tree })
    }
}

impl NeighborSearch for KdTreeSearch<'_> {
    fn nearest(&self, query: usize, k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let origin = self.positions[query];
        let mut found: Vec<Neighbor> = self
            .tree
            .nearest_n::<SquaredEuclidean>(&origin.to_array(), k + 1)
            .into_iter()
            .map(|n| n.item as usize)
            .filter(|&index| index != query)
            .map(|index| Neighbor {
                index,
                distance: origin.distance(self.positions[index]),
            })
            .collect();
        found.sort_by(by_distance_then_index);
        found.truncate(k);
        found
    }
}

/// Which search structure backs the scale estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnnBackend {
    BruteForce,
    KdTree,
    /// Brute force up to [`AUTO_BRUTE_FORCE_LIMIT`] points, k-d tree above.
    #[default]
    Auto,
}

impl KnnBackend {
    /// The concrete backend used for `n` points.
    pub fn resolve(self, n: usize) -> Self {
        match self {
            Self::Auto if n <= AUTO_BRUTE_FORCE_LIMIT => Self::BruteForce,
            Self::Auto => Self::KdTree,
            other => other,
        }
    }

    pub fn build<'a>(self, positions: &'a [DVec3]) -> Box<dyn NeighborSearch + 'a> {
        match self.resolve(positions.len()) {
            Self::KdTree => match KdTreeSearch::try_new(positions) {
                Some(tree) => Box::new(tree),
                None => {
                    warn!(
                        "At least {KD_TREE_BUCKET_SIZE} points share a coordinate value, using brute force"
                    );
                    Box::new(BruteForceSearch::new(positions))
                }
            },
            _ => Box::new(BruteForceSearch::new(positions)),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::BruteForce => "brute-force",
            Self::KdTree => "kd-tree",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for KnnBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KnnBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::BruteForce, Self::KdTree, Self::Auto]
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| format!("unknown KNN backend '{s}' (expected brute-force, kd-tree or auto)"))
    }
}
