//! Pluggable boundary-merge classifiers.
//!
//! Every model satisfies the same two-operation contract: fit on a filtered
//! (features, labels) training set with an optional class weighting, and
//! predict per-class probabilities for new feature rows. Concrete models
//! are swappable without touching the replay/labeling core.

pub mod ensemble;
pub mod linear;
pub mod logistic;
pub mod svm;

use std::str::FromStr;

use ndarray::{Array1, Array2};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use crate::error::{ClassifyError, Result};

pub use ensemble::VotingEnsemble;
pub use linear::LinearRegressionClassifier;
pub use logistic::LogisticRegressionClassifier;
pub use svm::{SvmClassifier, SvmKernel};

/// The fit/predict-probability contract every model satisfies.
pub trait Classifier {
    /// Fit on labels in `{-1.0, +1.0}`.
    fn fit(
        &mut self,
        samples: &Array2<f64>,
        labels: &Array1<f64>,
        weighting: ClassWeighting,
    ) -> Result<()>;

    /// Per-class probabilities, shape `(n_samples, 2)` with columns
    /// `[negative, positive]`; every row sums to 1.
    fn predict_probability(&self, samples: &Array2<f64>) -> Result<Array2<f64>>;
}

/// How example weights are assigned per class during fitting.
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
pub enum ClassWeighting {
    /// Every example weighs 1.
    #[default]
    Uniform,
    /// Weights proportional to inverse class frequency.
    Balanced,
}

impl ClassWeighting {
    /// Resolve to concrete `(negative, positive)` class weights for the
    /// given label vector.
    pub fn resolve(&self, labels: &Array1<f64>) -> (f64, f64) {
        match self {
            ClassWeighting::Uniform => (1.0, 1.0),
            ClassWeighting::Balanced => {
                let total = labels.len() as f64;
                let positives = labels.iter().filter(|&&label| label > 0.0).count() as f64;
                let negatives = total - positives;
                let negative = if negatives > 0.0 {
                    total / (2.0 * negatives)
                } else {
                    1.0
                };
                let positive = if positives > 0.0 {
                    total / (2.0 * positives)
                } else {
                    1.0
                };
                (negative, positive)
            }
        }
    }

    /// Weight of one example given its label.
    pub fn weight_of(&self, labels: &Array1<f64>, label: f64) -> f64 {
        let (negative, positive) = self.resolve(labels);
        if label > 0.0 { positive } else { negative }
    }
}

/// Which classifier a training run fits. Selectors resolve by exact key;
/// an unknown selector is a configuration error, not a fall-through.
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
pub enum ClassifierKind {
    #[default]
    Svm,
    LogisticRegression,
    LinearRegression,
}

impl ClassifierKind {
    /// Parse a selector, failing fast with the invalid value and the
    /// accepted set.
    pub fn parse(selector: &str) -> Result<Self> {
        Self::from_str(selector).map_err(|_| ClassifyError::UnknownClassifier {
            selector: selector.to_string(),
            expected: Self::VARIANTS.join(", "),
        })
    }

    /// Build an unfitted model of this kind.
    pub fn build(&self, kernel: SvmKernel) -> TrainedModel {
        match self {
            ClassifierKind::Svm => TrainedModel::Svm(SvmClassifier::with_kernel(kernel)),
            ClassifierKind::LogisticRegression => {
                TrainedModel::Logistic(LogisticRegressionClassifier::default())
            }
            ClassifierKind::LinearRegression => {
                TrainedModel::Linear(LinearRegressionClassifier::default())
            }
        }
    }
}

/// A concrete model behind one serializable object, the unit handed to
/// persistence. Implements [`Classifier`] by delegation so a reloaded
/// model predicts directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Svm(SvmClassifier),
    Logistic(LogisticRegressionClassifier),
    Linear(LinearRegressionClassifier),
}

impl Classifier for TrainedModel {
    fn fit(
        &mut self,
        samples: &Array2<f64>,
        labels: &Array1<f64>,
        weighting: ClassWeighting,
    ) -> Result<()> {
        match self {
            TrainedModel::Svm(model) => model.fit(samples, labels, weighting),
            TrainedModel::Logistic(model) => model.fit(samples, labels, weighting),
            TrainedModel::Linear(model) => model.fit(samples, labels, weighting),
        }
    }

    fn predict_probability(&self, samples: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            TrainedModel::Svm(model) => model.predict_probability(samples),
            TrainedModel::Logistic(model) => model.predict_probability(samples),
            TrainedModel::Linear(model) => model.predict_probability(samples),
        }
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// `[1 - p, p]` rows from positive-class probabilities.
pub(crate) fn probability_rows(positive: &[f64]) -> Array2<f64> {
    let mut rows = Array2::zeros((positive.len(), 2));
    for (row, &p) in positive.iter().enumerate() {
        rows[[row, 0]] = 1.0 - p;
        rows[[row, 1]] = p;
    }
    rows
}

pub(crate) fn validate_training_set(samples: &Array2<f64>, labels: &Array1<f64>) -> Result<()> {
    if samples.nrows() != labels.len() {
        return Err(ClassifyError::InvalidTrainingSet(format!(
            "{} sample rows but {} labels",
            samples.nrows(),
            labels.len()
        )));
    }
    if samples.nrows() == 0 {
        return Err(ClassifyError::InvalidTrainingSet(
            "no training rows".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn require_both_classes(labels: &Array1<f64>) -> Result<()> {
    let positives = labels.iter().filter(|&&label| label > 0.0).count();
    if positives == 0 || positives == labels.len() {
        return Err(ClassifyError::InvalidTrainingSet(
            "training set must contain both classes".to_string(),
        ));
    }
    Ok(())
}
