//! # Boundary-Merge Training Library
//!
//! Turns a recorded region-merging sequence into a labeled training set
//! for a boundary-merge classifier, and fits/persists that classifier.
//!
//! ## Core Features
//!
//! - **Merge-history replay**: drives a freshly built [`rag::RegionGraph`]
//!   through a recorded merge order, extracting features before each merge
//! - **Ground-truth labeling**: judges every candidate boundary against a
//!   [`BoundaryMask`] under asymmetric, strict tolerance thresholds
//! - **Pluggable classifiers**: SVM, logistic regression and linear
//!   regression behind one [`Classifier`] contract, plus a voting-ensemble
//!   example
//! - **Persistence**: one opaque model object, and an optional
//!   `samples`/`labels` training-data dump
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classify::{
//!     BoundaryMask, ClassWeighting, Classifier, ClassifierKind, ReplayLabeler, SvmKernel,
//! };
//! use rag::{FullStatistics, RegionGraph};
//! use volume::Volume;
//!
//! # let watershed: Volume<u32> = Volume::filled(vec![4, 4], 1);
//! # let probabilities: Volume<f64> = Volume::filled(vec![4, 4], 0.5);
//! # let ground_truth: Volume<u32> = Volume::filled(vec![4, 4], 1);
//! let mask = BoundaryMask::best_possible(&watershed, &ground_truth)?;
//!
//! let mut recorder = RegionGraph::from_volumes(&watershed, &probabilities)?;
//! let history = recorder.agglomerate(0.5)?;
//!
//! let mut graph = RegionGraph::from_volumes(&watershed, &probabilities)?;
//! let set = ReplayLabeler::default()
//!     .replay(&mut graph, &history, &mask, &FullStatistics)?
//!     .filtered();
//!
//! let mut model = ClassifierKind::Svm.build(SvmKernel::Rbf);
//! model.fit(&set.samples, &set.labels, ClassWeighting::Balanced)?;
//! # Ok::<(), classify::ClassifyError>(())
//! ```

pub mod classifier;
pub mod error;
pub mod groundtruth;
pub mod persist;
pub mod replay;

pub use classifier::{
    ClassWeighting, Classifier, ClassifierKind, LinearRegressionClassifier,
    LogisticRegressionClassifier, SvmClassifier, SvmKernel, TrainedModel, VotingEnsemble,
};
pub use error::{ClassifyError, Result};
pub use groundtruth::BoundaryMask;
pub use persist::{load_model, load_training_data, save_model, save_training_data};
pub use replay::{ReplayLabeler, TrainingSet};
