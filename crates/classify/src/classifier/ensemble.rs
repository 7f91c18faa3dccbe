//! Example ensemble adapter.
//!
//! A thin voting wrapper over constituent models: the positive-class
//! probability of a sample is the fraction of constituents that vote
//! positive for it. Mostly useful as a template for plugging in ensemble
//! models behind the [`Classifier`] contract.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassWeighting, Classifier, TrainedModel, probability_rows};
use crate::error::{ClassifyError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VotingEnsemble {
    estimators: Vec<TrainedModel>,
}

impl VotingEnsemble {
    pub fn new(estimators: Vec<TrainedModel>) -> Self {
        Self { estimators }
    }

    pub fn len(&self) -> usize {
        self.estimators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimators.is_empty()
    }

    fn require_estimators(&self) -> Result<()> {
        if self.estimators.is_empty() {
            return Err(ClassifyError::InvalidTrainingSet(
                "ensemble has no constituent estimators".to_string(),
            ));
        }
        Ok(())
    }
}

impl Classifier for VotingEnsemble {
    fn fit(
        &mut self,
        samples: &Array2<f64>,
        labels: &Array1<f64>,
        weighting: ClassWeighting,
    ) -> Result<()> {
        self.require_estimators()?;
        for estimator in &mut self.estimators {
            estimator.fit(samples, labels, weighting)?;
        }
        Ok(())
    }

    fn predict_probability(&self, samples: &Array2<f64>) -> Result<Array2<f64>> {
        self.require_estimators()?;
        let mut votes = vec![0usize; samples.nrows()];
        for estimator in &self.estimators {
            let probabilities = estimator.predict_probability(samples)?;
            for (row, count) in votes.iter_mut().enumerate() {
                if probabilities[[row, 1]] > 0.5 {
                    *count += 1;
                }
            }
        }
        let total = self.estimators.len() as f64;
        let positive: Vec<f64> = votes.into_iter().map(|count| count as f64 / total).collect();
        Ok(probability_rows(&positive))
    }
}
