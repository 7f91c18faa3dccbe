//! Region-adjacency graph over a watershed volume.
//!
//! Nodes are watershed regions (label > 0), edges are the voxel interfaces
//! between geometrically adjacent regions (watershed label 0). Extents and
//! boundaries are sorted index arrays into the padded probability arena, and
//! every index set carries a [`StreamingStats`] accumulator that is mutated
//! only together with the set, so `extent.len() == stats.count()` holds at
//! every step of a merge sequence.
//!
//! Storage is ordered (`BTreeMap` keyed by region id / id pair), which makes
//! two graphs built from identical volumes iterate identically. Replaying a
//! recorded merge history against a freshly built graph therefore
//! reproduces the exact state sequence of the run that recorded it.

use std::cmp::Reverse;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use tracing::debug;
use volume::Volume;

use crate::error::{RagError, Result};
use crate::stats::StreamingStats;

pub type RegionId = u32;

/// Unordered region pairs are keyed `(min, max)`.
pub fn edge_key(n1: RegionId, n2: RegionId) -> (RegionId, RegionId) {
    if n1 <= n2 { (n1, n2) } else { (n2, n1) }
}

/// A region of the volume: the voxels it owns and their accumulated
/// probability statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    /// Sorted raveled voxel indices into the padded arena.
    pub extent: Vec<usize>,
    pub stats: StreamingStats,
}

/// The voxel interface between two adjacent regions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryEdge {
    /// Sorted raveled voxel indices into the padded arena.
    pub boundary: Vec<usize>,
    pub stats: StreamingStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionGraph {
    probabilities: Volume<f64>,
    regions: BTreeMap<RegionId, Region>,
    edges: BTreeMap<(RegionId, RegionId), BoundaryEdge>,
    adjacency: BTreeMap<RegionId, BTreeSet<RegionId>>,
}

impl RegionGraph {
    /// Build an un-merged graph from a watershed label volume and a
    /// probability volume of the same shape.
    ///
    /// Both volumes are padded by one zero layer, so raveled indices held
    /// by the graph live in the padded index space shared with a padded
    /// ground-truth mask.
    pub fn from_volumes(watershed: &Volume<u32>, probabilities: &Volume<f64>) -> Result<Self> {
        if watershed.shape() != probabilities.shape() {
            return Err(RagError::VolumeShapeMismatch {
                watershed: watershed.shape().to_vec(),
                probability: probabilities.shape().to_vec(),
            });
        }
        let labels = watershed.pad(1, 0);
        let probabilities = probabilities.pad(1, 0.0);
        let strides = labels.strides();
        let shape = labels.shape().to_vec();

        let mut graph = Self {
            probabilities,
            regions: BTreeMap::new(),
            edges: BTreeMap::new(),
            adjacency: BTreeMap::new(),
        };

        // region pass: ascending index order keeps extents sorted
        for index in 0..labels.len() {
            let label = labels.get(index);
            if label == 0 {
                continue;
            }
            let probability = graph.probabilities.get(index);
            let region = graph.regions.entry(label).or_default();
            region.extent.push(index);
            region.stats.push(probability);
            graph.adjacency.entry(label).or_default();
        }

        // boundary pass: a zero voxel joins the edge of every unordered
        // pair of distinct region labels around it
        let mut neighbor_labels = BTreeSet::new();
        for index in 0..labels.len() {
            if labels.get(index) != 0 {
                continue;
            }
            neighbor_labels.clear();
            let coords = labels.unravel(index);
            for (axis, &stride) in strides.iter().enumerate() {
                if coords[axis] > 0 {
                    let label = labels.get(index - stride);
                    if label != 0 {
                        neighbor_labels.insert(label);
                    }
                }
                if coords[axis] + 1 < shape[axis] {
                    let label = labels.get(index + stride);
                    if label != 0 {
                        neighbor_labels.insert(label);
                    }
                }
            }
            let probability = graph.probabilities.get(index);
            let around: Vec<RegionId> = neighbor_labels.iter().copied().collect();
            for (i, &a) in around.iter().enumerate() {
                for &b in &around[i + 1..] {
                    let edge = graph.edges.entry(edge_key(a, b)).or_default();
                    // ascending scan: a repeat can only be the last index
                    if edge.boundary.last() != Some(&index) {
                        edge.boundary.push(index);
                        edge.stats.push(probability);
                    }
                    graph.adjacency.entry(a).or_default().insert(b);
                    graph.adjacency.entry(b).or_default().insert(a);
                }
            }
        }

        debug!(
            regions = graph.regions.len(),
            boundaries = graph.edges.len(),
            "constructed region graph"
        );
        Ok(graph)
    }

    pub fn region(&self, id: RegionId) -> Result<&Region> {
        self.regions.get(&id).ok_or(RagError::MissingRegion(id))
    }

    pub fn boundary(&self, n1: RegionId, n2: RegionId) -> Result<&BoundaryEdge> {
        self.edges
            .get(&edge_key(n1, n2))
            .ok_or(RagError::MissingBoundary(n1, n2))
    }

    pub fn contains_region(&self, id: RegionId) -> bool {
        self.regions.contains_key(&id)
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn num_boundaries(&self) -> usize {
        self.edges.len()
    }

    pub fn region_ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.keys().copied()
    }

    pub fn boundary_pairs(&self) -> impl Iterator<Item = (RegionId, RegionId)> + '_ {
        self.edges.keys().copied()
    }

    pub fn neighbors(&self, id: RegionId) -> impl Iterator<Item = RegionId> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Probability value of a voxel in the padded arena.
    pub fn probability(&self, index: usize) -> f64 {
        self.probabilities.get(index)
    }

    pub fn probabilities(&self) -> &Volume<f64> {
        &self.probabilities
    }

    /// Merge `n2` into `n1` in place.
    ///
    /// `n1` absorbs `n2`'s extent, the voxels of their shared boundary, and
    /// `n2`'s remaining edges (re-keyed onto `n1`, boundaries unioned).
    /// A voxel contributes to an accumulator exactly once, on its first
    /// insertion into the target set, so accumulators stay consistent with
    /// their sets even across junction voxels shared by several boundaries.
    pub fn merge(&mut self, n1: RegionId, n2: RegionId) -> Result<()> {
        if n1 == n2 {
            return Err(RagError::SelfMerge(n1));
        }
        if !self.regions.contains_key(&n1) {
            return Err(RagError::MissingRegion(n1));
        }
        let absorbed = self
            .regions
            .remove(&n2)
            .ok_or(RagError::MissingRegion(n2))?;

        // rewire n2's other boundaries onto n1
        let rewired: Vec<RegionId> = self
            .adjacency
            .get(&n2)
            .map(|set| set.iter().copied().filter(|&w| w != n1).collect())
            .unwrap_or_default();
        for w in rewired {
            let Some(moved) = self.edges.remove(&edge_key(n2, w)) else {
                continue;
            };
            if let Some(set) = self.adjacency.get_mut(&w) {
                set.remove(&n2);
                set.insert(n1);
            }
            self.adjacency.entry(n1).or_default().insert(w);
            match self.edges.entry(edge_key(n1, w)) {
                Entry::Occupied(mut entry) => {
                    let edge = entry.get_mut();
                    union_voxels(
                        &mut edge.boundary,
                        &mut edge.stats,
                        &moved.boundary,
                        &self.probabilities,
                    );
                }
                Entry::Vacant(entry) => {
                    entry.insert(moved);
                }
            }
        }

        // absorb the extent, then the shared boundary voxels
        let shared = self.edges.remove(&edge_key(n1, n2));
        self.adjacency.remove(&n2);
        if let Some(set) = self.adjacency.get_mut(&n1) {
            set.remove(&n2);
        }

        let region = self
            .regions
            .get_mut(&n1)
            .ok_or(RagError::MissingRegion(n1))?;
        merge_sorted_disjoint(&mut region.extent, &absorbed.extent);
        region.stats.merge(&absorbed.stats);
        if let Some(shared) = shared {
            union_voxels(
                &mut region.extent,
                &mut region.stats,
                &shared.boundary,
                &self.probabilities,
            );
        }
        Ok(())
    }

    /// Agglomerate until the cheapest boundary (by mean probability)
    /// exceeds `max_threshold`, recording the merge order.
    ///
    /// Priorities use `f64::total_cmp` and ties break on the region-id
    /// pair, so the recorded history is a deterministic function of the
    /// input volumes.
    pub fn agglomerate(&mut self, max_threshold: f64) -> Result<Vec<(RegionId, RegionId)>> {
        let mut heap: BinaryHeap<Reverse<MergeCandidate>> = self
            .edges
            .iter()
            .map(|(&pair, edge)| {
                Reverse(MergeCandidate {
                    priority: edge.stats.mean(),
                    pair,
                })
            })
            .collect();

        let mut history = Vec::new();
        while let Some(Reverse(candidate)) = heap.pop() {
            // stale entries point at removed or since-updated edges
            let Some(edge) = self.edges.get(&candidate.pair) else {
                continue;
            };
            if edge.stats.mean() != candidate.priority {
                continue;
            }
            if candidate.priority > max_threshold {
                break;
            }
            let (n1, n2) = candidate.pair;
            self.merge(n1, n2)?;
            history.push((n1, n2));
            if let Some(neighbors) = self.adjacency.get(&n1) {
                for &w in neighbors {
                    let pair = edge_key(n1, w);
                    if let Some(edge) = self.edges.get(&pair) {
                        heap.push(Reverse(MergeCandidate {
                            priority: edge.stats.mean(),
                            pair,
                        }));
                    }
                }
            }
        }
        debug!(merges = history.len(), "agglomerated to threshold");
        Ok(history)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MergeCandidate {
    priority: f64,
    pair: (RegionId, RegionId),
}

impl Eq for MergeCandidate {}

impl Ord for MergeCandidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.pair.cmp(&other.pair))
    }
}

impl PartialOrd for MergeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Append `source` into the sorted set `target`, pushing the probability of
/// each voxel that was not already present.
fn union_voxels(
    target: &mut Vec<usize>,
    stats: &mut StreamingStats,
    source: &[usize],
    probabilities: &Volume<f64>,
) {
    let mut merged = Vec::with_capacity(target.len() + source.len());
    let mut i = 0;
    let mut j = 0;
    while i < target.len() && j < source.len() {
        match target[i].cmp(&source[j]) {
            std::cmp::Ordering::Less => {
                merged.push(target[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(source[j]);
                stats.push(probabilities.get(source[j]));
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                merged.push(target[i]);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&target[i..]);
    for &voxel in &source[j..] {
        merged.push(voxel);
        stats.push(probabilities.get(voxel));
    }
    *target = merged;
}

/// Merge two sorted, disjoint index sets.
fn merge_sorted_disjoint(target: &mut Vec<usize>, source: &[usize]) {
    let mut merged = Vec::with_capacity(target.len() + source.len());
    let mut i = 0;
    let mut j = 0;
    while i < target.len() && j < source.len() {
        if target[i] < source[j] {
            merged.push(target[i]);
            i += 1;
        } else {
            merged.push(source[j]);
            j += 1;
        }
    }
    merged.extend_from_slice(&target[i..]);
    merged.extend_from_slice(&source[j..]);
    *target = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three vertical regions separated by a probability ridge:
    /// labels `1 | 0 | 2` by column, probabilities 0.2 / ridge / 0.4.
    fn create_two_region_volumes() -> (Volume<u32>, Volume<f64>) {
        let ws = Volume::new(vec![3, 3], vec![1, 0, 2, 1, 0, 2, 1, 0, 2])
            .expect("Should build watershed");
        let probs = Volume::new(
            vec![3, 3],
            vec![0.2, 0.9, 0.4, 0.2, 0.8, 0.4, 0.2, 0.7, 0.4],
        )
        .expect("Should build probabilities");
        (ws, probs)
    }

    fn assert_consistent(graph: &RegionGraph) {
        for id in graph.region_ids().collect::<Vec<_>>() {
            let region = graph.region(id).expect("Should find region");
            assert_eq!(region.extent.len(), region.stats.count());
        }
        for (n1, n2) in graph.boundary_pairs().collect::<Vec<_>>() {
            let edge = graph.boundary(n1, n2).expect("Should find boundary");
            assert_eq!(edge.boundary.len(), edge.stats.count());
        }
    }

    #[test]
    fn test_construction() {
        let (ws, probs) = create_two_region_volumes();
        let graph = RegionGraph::from_volumes(&ws, &probs).expect("Should build graph");

        assert_eq!(graph.num_regions(), 2);
        assert_eq!(graph.num_boundaries(), 1);

        let r1 = graph.region(1).expect("Should find region 1");
        assert_eq!(r1.extent.len(), 3);
        assert!((r1.stats.mean() - 0.2).abs() < 1e-12);

        let edge = graph.boundary(1, 2).expect("Should find boundary");
        assert_eq!(edge.boundary.len(), 3);
        assert!((edge.stats.mean() - 0.8).abs() < 1e-12);

        assert_eq!(graph.neighbors(1).collect::<Vec<_>>(), vec![2]);
        assert_consistent(&graph);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let ws = Volume::filled(vec![2, 2], 1u32);
        let probs = Volume::filled(vec![2, 3], 0.5);
        assert!(matches!(
            RegionGraph::from_volumes(&ws, &probs),
            Err(RagError::VolumeShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_merge_absorbs_extent_and_boundary() {
        let (ws, probs) = create_two_region_volumes();
        let mut graph = RegionGraph::from_volumes(&ws, &probs).expect("Should build graph");
        graph.merge(1, 2).expect("Should merge");

        assert_eq!(graph.num_regions(), 1);
        assert_eq!(graph.num_boundaries(), 0);
        assert!(!graph.contains_region(2));

        let merged = graph.region(1).expect("Should find merged region");
        assert_eq!(merged.extent.len(), 9);
        let total: f64 = probs.as_slice().iter().sum();
        assert!((merged.stats.mean() - total / 9.0).abs() < 1e-12);
        assert_consistent(&graph);
    }

    #[test]
    fn test_merge_missing_region_and_self_merge() {
        let (ws, probs) = create_two_region_volumes();
        let mut graph = RegionGraph::from_volumes(&ws, &probs).expect("Should build graph");
        assert!(matches!(graph.merge(1, 7), Err(RagError::MissingRegion(7))));
        assert!(matches!(graph.merge(1, 1), Err(RagError::SelfMerge(1))));
    }

    #[test]
    fn test_junction_voxels_counted_once() {
        // voxel (0,1) touches regions 1, 2 and 3 at once
        let ws = Volume::new(vec![2, 3], vec![1, 0, 2, 0, 3, 0]).expect("Should build watershed");
        let probs =
            Volume::new(vec![2, 3], vec![0.1, 0.9, 0.2, 0.6, 0.3, 0.5]).expect("Should build");
        let mut graph = RegionGraph::from_volumes(&ws, &probs).expect("Should build graph");

        assert_eq!(graph.num_boundaries(), 3);
        assert_eq!(graph.boundary(1, 2).unwrap().boundary.len(), 1);
        assert_eq!(graph.boundary(1, 3).unwrap().boundary.len(), 2);
        assert_eq!(graph.boundary(2, 3).unwrap().boundary.len(), 2);

        graph.merge(1, 2).expect("Should merge 1-2");
        // the (1,3) and (2,3) boundaries share the junction voxel; the
        // union must hold it once
        let edge = graph.boundary(1, 3).expect("Should find rewired boundary");
        assert_eq!(edge.boundary.len(), 3);
        assert_consistent(&graph);

        graph.merge(1, 3).expect("Should merge 1-3");
        let merged = graph.region(1).expect("Should find final region");
        // every voxel of the 2x3 volume ends up in the single region
        assert_eq!(merged.extent.len(), 6);
        let total: f64 = probs.as_slice().iter().sum();
        assert!((merged.stats.mean() - total / 6.0).abs() < 1e-12);
        assert_consistent(&graph);
    }

    #[test]
    fn test_agglomerate_respects_threshold() {
        // boundary 1|2 has mean 0.8, boundary 2|3 mean 0.2
        let ws = Volume::new(vec![1, 5], vec![1, 0, 2, 0, 3]).expect("Should build watershed");
        let probs =
            Volume::new(vec![1, 5], vec![0.5, 0.8, 0.5, 0.2, 0.5]).expect("Should build");

        let mut graph = RegionGraph::from_volumes(&ws, &probs).expect("Should build graph");
        let history = graph.agglomerate(0.5).expect("Should agglomerate");
        assert_eq!(history, vec![(2, 3)]);
        assert_eq!(graph.num_regions(), 2);

        let mut graph = RegionGraph::from_volumes(&ws, &probs).expect("Should build graph");
        let history = graph.agglomerate(1.0).expect("Should agglomerate");
        assert_eq!(history.len(), 2);
        assert_eq!(graph.num_regions(), 1);
    }

    #[test]
    fn test_identical_volumes_build_identical_graphs() {
        let (ws, probs) = create_two_region_volumes();
        let a = RegionGraph::from_volumes(&ws, &probs).expect("Should build graph");
        let b = RegionGraph::from_volumes(&ws, &probs).expect("Should build graph");
        assert_eq!(a, b);

        let mut a = a;
        let mut b = b;
        let ha = a.agglomerate(f64::INFINITY).expect("Should agglomerate");
        let hb = b.agglomerate(f64::INFINITY).expect("Should agglomerate");
        assert_eq!(ha, hb);
        assert_eq!(a, b);
    }
}
