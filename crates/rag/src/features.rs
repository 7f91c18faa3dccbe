//! Boundary/region feature extraction.
//!
//! A feature extractor maps a graph and a candidate region pair to a
//! fixed-width numeric row. Extractors are read-only with respect to the
//! graph, so they can be evaluated at every step of a merge-history replay
//! against the graph state of that step.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use crate::error::Result;
use crate::graph::{RegionGraph, RegionId};
use crate::stats::StreamingStats;

pub trait FeatureExtractor {
    /// Width of every row this extractor produces.
    fn width(&self) -> usize;

    /// Feature row for the boundary between `n1` and `n2`, and the two
    /// regions, in the graph state as passed.
    fn features(&self, graph: &RegionGraph, n1: RegionId, n2: RegionId) -> Result<Vec<f64>>;
}

/// `[boundary mean, boundary SEM]`, recomputed from the raw boundary
/// probability values rather than the edge accumulators. Quick-diagnostic
/// variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryMoments;

impl FeatureExtractor for BoundaryMoments {
    fn width(&self) -> usize {
        2
    }

    fn features(&self, graph: &RegionGraph, n1: RegionId, n2: RegionId) -> Result<Vec<f64>> {
        let edge = graph.boundary(n1, n2)?;
        let mut stats = StreamingStats::new();
        for &voxel in &edge.boundary {
            stats.push(graph.probability(voxel));
        }
        Ok(vec![stats.mean(), stats.sem()])
    }
}

/// The default 9-wide row, entirely accumulator-driven:
/// `[b_mean, b_sem, b_count, mean1, sem1, count1, mean2, sem2, count2]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullStatistics;

impl FeatureExtractor for FullStatistics {
    fn width(&self) -> usize {
        9
    }

    fn features(&self, graph: &RegionGraph, n1: RegionId, n2: RegionId) -> Result<Vec<f64>> {
        let edge = graph.boundary(n1, n2)?;
        let r1 = graph.region(n1)?;
        let r2 = graph.region(n2)?;
        Ok(vec![
            edge.stats.mean(),
            edge.stats.sem(),
            edge.stats.count() as f64,
            r1.stats.mean(),
            r1.stats.sem(),
            r1.extent.len() as f64,
            r2.stats.mean(),
            r2.stats.sem(),
            r2.extent.len() as f64,
        ])
    }
}

/// Selector for the extractor a pipeline runs with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FeatureSetKind {
    /// [`BoundaryMoments`]
    Moments,
    /// [`FullStatistics`]
    #[default]
    FullStatistics,
}

impl FeatureSetKind {
    pub fn build(&self) -> Box<dyn FeatureExtractor> {
        match self {
            FeatureSetKind::Moments => Box::new(BoundaryMoments),
            FeatureSetKind::FullStatistics => Box::new(FullStatistics),
        }
    }
}
