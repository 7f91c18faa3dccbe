//! Ground-truth boundary masks.
//!
//! A [`BoundaryMask`] marks the voxels lying on *true* segment boundaries.
//! It lives in the same one-layer-padded index space as [`rag::RegionGraph`],
//! so the raveled boundary indices a graph hands out can be looked up
//! directly.

use std::collections::{BTreeMap, BTreeSet};

use volume::Volume;

use crate::error::{ClassifyError, Result};

/// Binary volume of true-boundary voxels, padded to the graph convention.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryMask {
    mask: Volume<u8>,
}

impl BoundaryMask {
    /// Wrap an unpadded binary volume (nonzero = true boundary), adding
    /// the one-layer false border that aligns it with graph indices.
    pub fn from_binary(mask: &Volume<u8>) -> Self {
        Self {
            mask: mask.pad(1, 0),
        }
    }

    /// Derive the mask from a watershed volume and a ground-truth label
    /// volume.
    ///
    /// Each watershed region is relabeled to the ground-truth body it
    /// mostly overlaps (ties to the smaller body id; regions overlapping
    /// no body keep a synthetic body of their own). A watershed-line voxel
    /// is a true boundary iff it touches at least two distinct bodies;
    /// lines between regions of the same body are dissolved.
    pub fn best_possible(watershed: &Volume<u32>, ground_truth: &Volume<u32>) -> Result<Self> {
        if watershed.shape() != ground_truth.shape() {
            return Err(ClassifyError::ShapeMismatch {
                watershed: watershed.shape().to_vec(),
                ground_truth: ground_truth.shape().to_vec(),
            });
        }

        // majority vote per watershed region
        let mut votes: BTreeMap<u32, BTreeMap<u32, usize>> = BTreeMap::new();
        for index in 0..watershed.len() {
            let region = watershed.get(index);
            let body = ground_truth.get(index);
            if region != 0 && body != 0 {
                *votes.entry(region).or_default().entry(body).or_default() += 1;
            }
        }
        let max_body = ground_truth.as_slice().iter().copied().max().unwrap_or(0);
        let body_of = |region: u32| -> u32 {
            match votes.get(&region) {
                Some(counts) => {
                    let (&body, _) = counts
                        .iter()
                        .max_by_key(|&(&body, &count)| (count, std::cmp::Reverse(body)))
                        .expect("vote table entries are non-empty");
                    body
                }
                // no overlap with any body: the region stays its own body
                None => max_body + region,
            }
        };

        let labels = watershed.pad(1, 0);
        let strides = labels.strides();
        let shape = labels.shape().to_vec();
        let mut mask = Volume::filled(shape.clone(), 0u8);

        let mut bodies = BTreeSet::new();
        for index in 0..labels.len() {
            if labels.get(index) != 0 {
                continue;
            }
            bodies.clear();
            let coords = labels.unravel(index);
            for (axis, &stride) in strides.iter().enumerate() {
                if coords[axis] > 0 {
                    let label = labels.get(index - stride);
                    if label != 0 {
                        bodies.insert(body_of(label));
                    }
                }
                if coords[axis] + 1 < shape[axis] {
                    let label = labels.get(index + stride);
                    if label != 0 {
                        bodies.insert(body_of(label));
                    }
                }
            }
            if bodies.len() >= 2 {
                mask.set(index, 1);
            }
        }
        Ok(Self { mask })
    }

    /// Whether the padded-space voxel lies on a true boundary.
    pub fn is_true(&self, index: usize) -> bool {
        self.mask.get(index) != 0
    }

    /// Fraction of the given boundary voxels that are true boundaries.
    ///
    /// An empty index set has no overlap fraction; `None` marks the merge
    /// as ambiguous rather than dividing by zero.
    pub fn fraction_true(&self, indices: &[usize]) -> Option<f64> {
        if indices.is_empty() {
            return None;
        }
        let hits = indices.iter().filter(|&&i| self.is_true(i)).count();
        Some(hits as f64 / indices.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag::RegionGraph;

    #[test]
    fn test_fraction_true_counts_hits() {
        let binary = Volume::new(vec![1, 3], vec![1u8, 0, 1]).expect("Should build mask");
        let mask = BoundaryMask::from_binary(&binary);
        // padded shape [3, 5]; interior row is index 6..9
        let interior: Vec<usize> = vec![6, 7, 8];
        assert!(mask.is_true(6));
        assert!(!mask.is_true(7));
        assert_eq!(mask.fraction_true(&interior), Some(2.0 / 3.0));
    }

    #[test]
    fn test_empty_boundary_is_ambiguous() {
        let binary = Volume::filled(vec![2, 2], 0u8);
        let mask = BoundaryMask::from_binary(&binary);
        assert_eq!(mask.fraction_true(&[]), None);
    }

    #[test]
    fn test_best_possible_dissolves_same_body_lines() {
        // regions 1 and 2 both map to body 7; region 3 maps to body 9
        let ws = Volume::new(vec![1, 5], vec![1, 0, 2, 0, 3]).expect("Should build watershed");
        let gt = Volume::new(vec![1, 5], vec![7, 7, 7, 9, 9]).expect("Should build ground truth");
        let mask = BoundaryMask::best_possible(&ws, &gt).expect("Should derive mask");

        let graph = RegionGraph::from_volumes(&ws, &Volume::filled(vec![1, 5], 0.5))
            .expect("Should build graph");
        let line_12 = &graph.boundary(1, 2).expect("Should find boundary").boundary;
        let line_23 = &graph.boundary(2, 3).expect("Should find boundary").boundary;

        // 1|2 separates the same body: dissolved. 2|3 separates 7 from 9.
        assert_eq!(mask.fraction_true(line_12), Some(0.0));
        assert_eq!(mask.fraction_true(line_23), Some(1.0));
    }

    #[test]
    fn test_best_possible_shape_mismatch() {
        let ws = Volume::filled(vec![2, 2], 1u32);
        let gt = Volume::filled(vec![2, 3], 1u32);
        assert!(matches!(
            BoundaryMask::best_possible(&ws, &gt),
            Err(ClassifyError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_mask_indices_align_with_graph() {
        let ws = Volume::new(vec![1, 3], vec![1, 0, 2]).expect("Should build watershed");
        let binary = Volume::new(vec![1, 3], vec![0u8, 1, 0]).expect("Should build mask");
        let mask = BoundaryMask::from_binary(&binary);
        let graph = RegionGraph::from_volumes(&ws, &Volume::filled(vec![1, 3], 0.5))
            .expect("Should build graph");
        let line = &graph.boundary(1, 2).expect("Should find boundary").boundary;
        assert_eq!(mask.fraction_true(line), Some(1.0));
    }
}
