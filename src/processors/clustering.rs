//! Density-based (DBSCAN) clustering of filtered LIDAR points.
//!
//! Clustering sits behind the [`Clusterer`] trait so the backend can be swapped
//! without touching the rest of the pipeline. Two backends are provided:
//! - [`KdTreeDbscan`]: `kiddo` KD-tree radius queries, neighbor lists built in
//!   parallel with `rayon` (requires the `kdtree` feature)
//! - [`GridDbscan`]: uniform hash grid with cell size `eps`, no dependencies
//!
//! Both share the same neighbor convention and label assignment, so they
//! produce identical partitions for the same input.
//!
//! # Conventions
//!
//! - A point's neighborhood holds every point at distance `<= eps`, the point
//!   itself included.
//! - A point is *core* when its neighborhood holds at least `min_samples`
//!   points. `min_samples == 0` behaves like 1.
//! - Core points that are neighbors end up in the same cluster (transitively).
//! - A non-core point joins the cluster of its nearest core neighbor (lower
//!   index on ties); without core neighbors it is noise (label `-1`).
//! - Cluster ids are numbered in order of each cluster's lowest core index.
//!   Callers should only treat them as partition identifiers.
//!
//! # Example
//!
//! ```
//! use lidar_detector::processors::clustering::{Clusterer, GridDbscan};
//!
//! let coords = vec![[0.0f32, 0.0, 0.0], [0.5, 0.0, 0.0], [100.0, 100.0, 100.0]];
//! let labels = GridDbscan.cluster(&coords, 1.0, 2);
//! assert_eq!(labels, vec![0, 0, -1]);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "kdtree")]
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;

use crate::config::ClusteringBackend;

/// Label of points that belong to no cluster.
pub const NOISE: i32 = -1;

/// Capability interface of a density-based clustering backend.
///
/// Implementations return one label per input point: [`NOISE`] or a cluster
/// id `>= 0`. Membership must be deterministic for a fixed input order.
pub trait Clusterer: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    fn cluster(&self, coords: &[[f32; 3]], eps: f32, min_samples: usize) -> Vec<i32>;
}

/// Build the backend selected in the configuration.
///
/// Returns `None` when the backend was not compiled into this build.
pub fn build_clusterer(backend: ClusteringBackend) -> Option<Box<dyn Clusterer>> {
    match backend {
        #[cfg(feature = "kdtree")]
        ClusteringBackend::KdTree => Some(Box::new(KdTreeDbscan)),
        #[cfg(not(feature = "kdtree"))]
        ClusteringBackend::KdTree => None,
        ClusteringBackend::Grid => Some(Box::new(GridDbscan)),
    }
}

/// Atomic Union-Find data structure for lock-free parallel cluster merging.
///
/// Uses path compression with atomic compare-and-swap operations to safely
/// merge clusters from multiple threads without locks.
pub struct AtomicUnionFind {
    parent: Vec<AtomicUsize>,
}

impl AtomicUnionFind {
    /// Create a new union-find structure where each element is its own parent.
    #[inline]
    pub fn new(size: usize) -> Self {
        let parent = (0..size).map(AtomicUsize::new).collect();
        Self { parent }
    }

    /// Find the root of the set containing `x` with path compression.
    ///
    /// Relaxed loads are enough: a stale parent only delays convergence to
    /// the root, it never points outside the set.
    #[inline]
    pub fn find(&self, mut x: usize) -> usize {
        loop {
            let p = self.parent[x].load(Ordering::Relaxed);
            if p == x {
                return x;
            }
            let gp = self.parent[p].load(Ordering::Relaxed);
            if gp != p {
                // Failure means another thread already moved x
                let _ = self.parent[x].compare_exchange_weak(
                    p,
                    gp,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
            }
            x = p;
        }
    }

    /// Union the sets containing `x` and `y`.
    ///
    /// Returns true if a merge actually occurred, false if they were already
    /// in the same set.
    #[inline]
    pub fn union(&self, x: usize, y: usize) -> bool {
        loop {
            let root_x = self.find(x);
            let root_y = self.find(y);

            if root_x == root_y {
                return false;
            }

            // Smaller root always points to the larger one
            let (small, large) = if root_x < root_y {
                (root_x, root_y)
            } else {
                (root_y, root_x)
            };

            match self.parent[small].compare_exchange_weak(
                small,
                large,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }
}

#[inline]
fn dist_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Turn per-point neighbor lists into DBSCAN labels.
///
/// `neighbors[i]` must hold every index within `eps` of point `i`, including
/// `i` itself. Order inside a list does not matter.
pub fn labels_from_neighbors(
    coords: &[[f32; 3]],
    neighbors: &[Vec<usize>],
    min_samples: usize,
) -> Vec<i32> {
    let n = coords.len();
    debug_assert_eq!(n, neighbors.len(), "one neighbor list per point");
    if n == 0 {
        return Vec::new();
    }
    let min_samples = min_samples.max(1);

    let is_core: Vec<bool> = neighbors
        .par_iter()
        .map(|neigh| neigh.len() >= min_samples)
        .collect();

    // Only core points are merged; border points are attached afterwards
    let uf = AtomicUnionFind::new(n);
    (0..n).into_par_iter().for_each(|i| {
        if is_core[i] {
            for &j in &neighbors[i] {
                if j != i && is_core[j] {
                    uf.union(i, j);
                }
            }
        }
    });

    // Ids follow the lowest core index of each cluster
    let mut root_to_cluster: HashMap<usize, i32> = HashMap::new();
    let mut next_cluster_id: i32 = 0;
    let mut labels = vec![NOISE; n];

    for i in 0..n {
        if is_core[i] {
            let root = uf.find(i);
            let id = *root_to_cluster.entry(root).or_insert_with(|| {
                let id = next_cluster_id;
                next_cluster_id += 1;
                id
            });
            labels[i] = id;
        }
    }

    for i in 0..n {
        if is_core[i] {
            continue;
        }
        let nearest_core = neighbors[i]
            .iter()
            .copied()
            .filter(|&j| is_core[j])
            .min_by(|&a, &b| {
                dist_sq(&coords[i], &coords[a])
                    .total_cmp(&dist_sq(&coords[i], &coords[b]))
                    .then(a.cmp(&b))
            });
        if let Some(j) = nearest_core {
            labels[i] = labels[j];
        }
    }

    labels
}

/// DBSCAN backed by a `kiddo` immutable KD-tree.
///
/// Tree construction is O(n log n); radius queries run in parallel across
/// points with rayon. Each call builds its own tree, nothing is cached.
#[cfg(feature = "kdtree")]
#[derive(Debug, Clone, Copy, Default)]
pub struct KdTreeDbscan;

#[cfg(feature = "kdtree")]
impl Clusterer for KdTreeDbscan {
    fn name(&self) -> &'static str {
        "kdtree"
    }

    fn cluster(&self, coords: &[[f32; 3]], eps: f32, min_samples: usize) -> Vec<i32> {
        if coords.is_empty() {
            return Vec::new();
        }

        let tree: ImmutableKdTree<f32, 3> = ImmutableKdTree::new_from_slice(coords);
        let eps_sq = eps * eps;
        let query_sq = eps_sq * (1.0 + 1e-4) + f32::EPSILON;

        let neighbors: Vec<Vec<usize>> = coords
            .par_iter()
            .enumerate()
            .map(|(i, coord)| {
                // Query a slightly larger radius, then apply the exact `<= eps` test
                let mut found: Vec<usize> = tree
                    .within::<SquaredEuclidean>(coord, query_sq)
                    .iter()
                    .map(|nn| nn.item as usize)
                    .filter(|&j| dist_sq(coord, &coords[j]) <= eps_sq)
                    .collect();
                if !found.contains(&i) {
                    found.push(i);
                }
                found
            })
            .collect();

        labels_from_neighbors(coords, &neighbors, min_samples)
    }
}

/// DBSCAN over a uniform hash grid.
///
/// Points are bucketed into cubic cells of side `eps`; every neighbor of a
/// point lies in the 27 cells around its own, so each query scans a bounded
/// region. Runs in near-linear time for LIDAR-like densities.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridDbscan;

type CellKey = (i64, i64, i64);

#[inline]
fn cell_of(coord: &[f32; 3], inv_cell: f32) -> CellKey {
    (
        (coord[0] * inv_cell).floor() as i64,
        (coord[1] * inv_cell).floor() as i64,
        (coord[2] * inv_cell).floor() as i64,
    )
}

impl Clusterer for GridDbscan {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn cluster(&self, coords: &[[f32; 3]], eps: f32, min_samples: usize) -> Vec<i32> {
        if coords.is_empty() {
            return Vec::new();
        }

        let eps_sq = eps * eps;
        let inv_cell = 1.0 / eps;

        let mut grid: HashMap<CellKey, Vec<usize>> = HashMap::new();
        for (i, coord) in coords.iter().enumerate() {
            grid.entry(cell_of(coord, inv_cell)).or_default().push(i);
        }

        let neighbors: Vec<Vec<usize>> = coords
            .iter()
            .map(|coord| {
                let (cx, cy, cz) = cell_of(coord, inv_cell);
                let mut found = Vec::new();
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        for dz in -1..=1 {
                            if let Some(bucket) = grid.get(&(cx + dx, cy + dy, cz + dz)) {
                                found.extend(
                                    bucket
                                        .iter()
                                        .copied()
                                        .filter(|&j| dist_sq(coord, &coords[j]) <= eps_sq),
                                );
                            }
                        }
                    }
                }
                found
            })
            .collect();

        labels_from_neighbors(coords, &neighbors, min_samples)
    }
}

/// Group point indices by cluster label, dropping noise.
///
/// Clusters are returned in ascending label order and the indices inside a
/// cluster keep the input order.
pub fn group_by_label(labels: &[i32]) -> Vec<Vec<usize>> {
    let cluster_count = labels.iter().copied().max().map_or(0, |m| (m + 1).max(0)) as usize;
    let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); cluster_count];
    for (i, &label) in labels.iter().enumerate() {
        if label >= 0 {
            clusters[label as usize].push(i);
        }
    }
    clusters.retain(|c| !c.is_empty());
    clusters
}
