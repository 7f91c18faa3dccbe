//! Logistic regression via weighted batch gradient descent.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{
    ClassWeighting, Classifier, probability_rows, require_both_classes, sigmoid,
    validate_training_set,
};
use crate::error::{ClassifyError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    pub learning_rate: f64,
    /// L2 regularization strength on the weights (not the intercept).
    pub l2: f64,
    pub max_iterations: usize,
    /// Stop when the gradient infinity-norm falls below this.
    pub tolerance: f64,
    weights: Option<Vec<f64>>,
    intercept: f64,
}

impl Default for LogisticRegressionClassifier {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            l2: 1e-4,
            max_iterations: 5000,
            tolerance: 1e-6,
            weights: None,
            intercept: 0.0,
        }
    }
}

impl LogisticRegressionClassifier {
    pub fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn fit(
        &mut self,
        samples: &Array2<f64>,
        labels: &Array1<f64>,
        weighting: ClassWeighting,
    ) -> Result<()> {
        validate_training_set(samples, labels)?;
        require_both_classes(labels)?;

        let n = samples.nrows();
        let d = samples.ncols();
        let (weight_negative, weight_positive) = weighting.resolve(labels);
        // labels in {-1, +1} become targets in {0, 1}
        let targets: Vec<f64> = labels.iter().map(|&l| if l > 0.0 { 1.0 } else { 0.0 }).collect();
        let sample_weights: Vec<f64> = labels
            .iter()
            .map(|&l| {
                if l > 0.0 {
                    weight_positive
                } else {
                    weight_negative
                }
            })
            .collect();

        let mut weights = vec![0.0; d];
        let mut intercept = 0.0;
        let mut iterations = 0;
        for iteration in 0..self.max_iterations {
            iterations = iteration + 1;
            let mut gradient = vec![0.0; d];
            let mut gradient_intercept = 0.0;
            for row in 0..n {
                let mut z = intercept;
                for column in 0..d {
                    z += weights[column] * samples[[row, column]];
                }
                let residual = sample_weights[row] * (sigmoid(z) - targets[row]);
                for column in 0..d {
                    gradient[column] += residual * samples[[row, column]];
                }
                gradient_intercept += residual;
            }
            let scale = 1.0 / n as f64;
            let mut largest = (gradient_intercept * scale).abs();
            for column in 0..d {
                gradient[column] = gradient[column] * scale + self.l2 * weights[column];
                largest = largest.max(gradient[column].abs());
                weights[column] -= self.learning_rate * gradient[column];
            }
            intercept -= self.learning_rate * gradient_intercept * scale;
            if largest < self.tolerance {
                break;
            }
        }
        debug!(iterations, "logistic regression converged or hit iteration cap");

        self.weights = Some(weights);
        self.intercept = intercept;
        Ok(())
    }

    fn predict_probability(&self, samples: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self.weights.as_ref().ok_or(ClassifyError::NotFitted)?;
        let positive: Vec<f64> = samples
            .rows()
            .into_iter()
            .map(|row| {
                let z = self.intercept
                    + weights
                        .iter()
                        .zip(row.iter())
                        .map(|(w, x)| w * x)
                        .sum::<f64>();
                sigmoid(z)
            })
            .collect();
        Ok(probability_rows(&positive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_separable_set() -> (Array2<f64>, Array1<f64>) {
        let samples = Array2::from_shape_vec(
            (6, 1),
            vec![0.0, 0.2, 0.4, 2.0, 2.2, 2.4],
        )
        .expect("Should build samples");
        let labels = Array1::from_vec(vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);
        (samples, labels)
    }

    #[test]
    fn test_separates_classes() {
        let (samples, labels) = create_separable_set();
        let mut model = LogisticRegressionClassifier::default();
        model
            .fit(&samples, &labels, ClassWeighting::Uniform)
            .expect("Should fit");
        assert!(model.is_fitted());

        let probabilities = model.predict_probability(&samples).expect("Should predict");
        assert_eq!(probabilities.shape(), &[6, 2]);
        for row in probabilities.rows() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-12);
        }
        assert!(probabilities[[0, 1]] < 0.5);
        assert!(probabilities[[5, 1]] > 0.5);
    }

    #[test]
    fn test_balanced_weighting_shifts_minority() {
        // one positive against four negatives
        let samples =
            Array2::from_shape_vec((5, 1), vec![0.0, 0.1, 0.2, 0.3, 1.0]).expect("Should build");
        let labels = Array1::from_vec(vec![-1.0, -1.0, -1.0, -1.0, 1.0]);

        let mut uniform = LogisticRegressionClassifier::default();
        uniform
            .fit(&samples, &labels, ClassWeighting::Uniform)
            .expect("Should fit");
        let mut balanced = LogisticRegressionClassifier::default();
        balanced
            .fit(&samples, &labels, ClassWeighting::Balanced)
            .expect("Should fit");

        let probe = Array2::from_shape_vec((1, 1), vec![1.0]).expect("Should build probe");
        let p_uniform = uniform.predict_probability(&probe).expect("Should predict")[[0, 1]];
        let p_balanced = balanced.predict_probability(&probe).expect("Should predict")[[0, 1]];
        // upweighting the minority positive class raises its probability
        assert!(p_balanced > p_uniform);
    }

    #[test]
    fn test_unfitted_error() {
        let model = LogisticRegressionClassifier::default();
        assert!(matches!(
            model.predict_probability(&Array2::zeros((1, 1))),
            Err(ClassifyError::NotFitted)
        ));
    }
}
