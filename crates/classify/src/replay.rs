//! Merge-history replay and labeling.
//!
//! The agglomeration run that recorded a merge history saw a specific graph
//! state at every step. Replaying drives a freshly built graph through the
//! same merges in the same order, extracting the feature row for each
//! candidate pair *before* applying its merge and judging the pair against
//! the ground-truth mask immediately after. The result is one (features,
//! label) row per merge event.

use ndarray::{Array1, Array2};
use tracing::{debug, info};

use rag::{FeatureExtractor, RegionGraph, RegionId};

use crate::error::Result;
use crate::groundtruth::BoundaryMask;

/// Feature matrix and label vector, one row per merge event.
///
/// Labels are `+1` (true merge), `-1` (false merge) or `0` (ambiguous).
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub samples: Array2<f64>,
    pub labels: Array1<f64>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Drop the ambiguous rows. Rows are dropped, never relabeled.
    pub fn filtered(&self) -> TrainingSet {
        let keep: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label != 0.0)
            .map(|(row, _)| row)
            .collect();
        let mut samples = Array2::zeros((keep.len(), self.samples.ncols()));
        let mut labels = Array1::zeros(keep.len());
        for (row, &source) in keep.iter().enumerate() {
            samples.row_mut(row).assign(&self.samples.row(source));
            labels[row] = self.labels[source];
        }
        TrainingSet { samples, labels }
    }
}

/// Replays a recorded merge history and labels each merge against a
/// ground-truth boundary mask.
#[derive(Debug, Clone)]
pub struct ReplayLabeler {
    /// A boundary overlapping *more* than this fraction of true boundary
    /// is a positive example.
    pub true_tolerance: f64,
    /// A boundary overlapping *less* than this fraction is a negative
    /// example.
    pub false_tolerance: f64,
}

impl Default for ReplayLabeler {
    fn default() -> Self {
        Self {
            true_tolerance: 0.9,
            false_tolerance: 0.1,
        }
    }
}

impl ReplayLabeler {
    pub fn new(true_tolerance: f64, false_tolerance: f64) -> Self {
        Self {
            true_tolerance,
            false_tolerance,
        }
    }

    /// Replay `history` against a freshly constructed `graph`, mutating it
    /// in place, and return one feature row and one label per merge.
    ///
    /// The graph must be un-merged and built over the same volumes as the
    /// run that recorded the history; each feature row is extracted from
    /// the graph state the recording run saw when it chose that merge.
    /// Both tolerance comparisons are strict, so a fraction exactly equal
    /// to either tolerance stays ambiguous, as does an empty boundary.
    pub fn replay(
        &self,
        graph: &mut RegionGraph,
        history: &[(RegionId, RegionId)],
        mask: &BoundaryMask,
        extractor: &dyn FeatureExtractor,
    ) -> Result<TrainingSet> {
        let mut samples = Array2::zeros((history.len(), extractor.width()));
        let mut labels = Array1::zeros(history.len());

        info!(merges = history.len(), "replaying merge history");
        for (step, &(n1, n2)) in history.iter().enumerate() {
            let row = extractor.features(graph, n1, n2)?;
            for (column, value) in row.into_iter().enumerate() {
                samples[[step, column]] = value;
            }

            let edge = graph.boundary(n1, n2)?;
            labels[step] = match mask.fraction_true(&edge.boundary) {
                Some(fraction) if fraction > self.true_tolerance => 1.0,
                Some(fraction) if fraction < self.false_tolerance => -1.0,
                _ => 0.0,
            };

            graph.merge(n1, n2)?;
            if (step + 1) % 10_000 == 0 {
                debug!(step = step + 1, total = history.len(), "replay progress");
            }
        }
        Ok(TrainingSet { samples, labels })
    }
}
