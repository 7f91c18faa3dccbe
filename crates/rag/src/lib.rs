//! # Region-Adjacency Graph Library
//!
//! Graph representation of an over-segmented volume, with the streaming
//! statistics and feature extraction a boundary-merge classifier is trained
//! on.
//!
//! ## Core Features
//!
//! - **Accumulator statistics**: regions and boundaries keep
//!   `(count, sum, sum-of-squares)` triples, never raw voxel values, and
//!   answer mean/variance/SEM queries in O(1)
//! - **Deterministic graphs**: ordered storage makes construction and
//!   agglomeration reproducible run-to-run over identical volumes
//! - **In-place merging**: a merge mutates the graph the way the recording
//!   agglomeration run did, so a recorded history can be replayed exactly
//! - **Pluggable feature extraction**: implement [`FeatureExtractor`] to
//!   change what a classifier sees
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rag::{FeatureSetKind, RegionGraph};
//! use volume::Volume;
//!
//! let watershed: Volume<u32> = Volume::filled(vec![4, 4, 4], 1);
//! let probabilities: Volume<f64> = Volume::filled(vec![4, 4, 4], 0.5);
//!
//! let mut graph = RegionGraph::from_volumes(&watershed, &probabilities)?;
//! let history = graph.agglomerate(0.5)?;
//!
//! let extractor = FeatureSetKind::FullStatistics.build();
//! # let _ = (history, extractor);
//! # Ok::<(), rag::RagError>(())
//! ```

pub mod error;
pub mod features;
pub mod graph;
pub mod stats;

pub use error::{RagError, Result};
pub use features::{BoundaryMoments, FeatureExtractor, FeatureSetKind, FullStatistics};
pub use graph::{BoundaryEdge, Region, RegionGraph, RegionId, edge_key};
pub use stats::StreamingStats;
