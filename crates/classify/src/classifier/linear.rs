//! Linear regression via the normal equations.
//!
//! Included for parity with the other adapters; it regresses the signed
//! label directly and has no probability output, which
//! [`Classifier::predict_probability`] reports as a typed error. Class
//! weighting is not part of the least-squares fit and is ignored.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassWeighting, Classifier, validate_training_set};
use crate::error::{ClassifyError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressionClassifier {
    /// Tiny diagonal loading keeping the normal equations well-posed.
    pub ridge: f64,
    coefficients: Option<Vec<f64>>,
    intercept: f64,
}

impl Default for LinearRegressionClassifier {
    fn default() -> Self {
        Self {
            ridge: 1e-8,
            coefficients: None,
            intercept: 0.0,
        }
    }
}

impl LinearRegressionClassifier {
    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    /// Regression output `x . coefficients + intercept` per row.
    pub fn predict(&self, samples: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(ClassifyError::NotFitted)?;
        let values: Vec<f64> = samples
            .rows()
            .into_iter()
            .map(|row| {
                self.intercept
                    + coefficients
                        .iter()
                        .zip(row.iter())
                        .map(|(c, x)| c * x)
                        .sum::<f64>()
            })
            .collect();
        Ok(Array1::from_vec(values))
    }
}

impl Classifier for LinearRegressionClassifier {
    fn fit(
        &mut self,
        samples: &Array2<f64>,
        labels: &Array1<f64>,
        _weighting: ClassWeighting,
    ) -> Result<()> {
        validate_training_set(samples, labels)?;

        let d = samples.ncols();
        let m = d + 1; // trailing intercept column
        let mut normal = vec![vec![0.0; m]; m];
        let mut moment = vec![0.0; m];
        let mut augmented = vec![0.0; m];
        for row in 0..samples.nrows() {
            for column in 0..d {
                augmented[column] = samples[[row, column]];
            }
            augmented[d] = 1.0;
            for p in 0..m {
                moment[p] += augmented[p] * labels[row];
                for q in 0..m {
                    normal[p][q] += augmented[p] * augmented[q];
                }
            }
        }
        for p in 0..m {
            normal[p][p] += self.ridge;
        }

        let solution = solve_linear_system(normal, moment)?;
        self.intercept = solution[d];
        self.coefficients = Some(solution[..d].to_vec());
        Ok(())
    }

    fn predict_probability(&self, _samples: &Array2<f64>) -> Result<Array2<f64>> {
        Err(ClassifyError::ProbabilityUnsupported {
            model: "linear-regression",
        })
    }
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let m = b.len();
    for pivot in 0..m {
        let mut best = pivot;
        for row in pivot + 1..m {
            if a[row][pivot].abs() > a[best][pivot].abs() {
                best = row;
            }
        }
        if a[best][pivot].abs() < 1e-300 {
            return Err(ClassifyError::InvalidTrainingSet(
                "singular normal equations".to_string(),
            ));
        }
        a.swap(pivot, best);
        b.swap(pivot, best);

        for row in pivot + 1..m {
            let factor = a[row][pivot] / a[pivot][pivot];
            for column in pivot..m {
                a[row][column] -= factor * a[pivot][column];
            }
            b[row] -= factor * b[pivot];
        }
    }
    let mut solution = vec![0.0; m];
    for pivot in (0..m).rev() {
        let mut value = b[pivot];
        for column in pivot + 1..m {
            value -= a[pivot][column] * solution[column];
        }
        solution[pivot] = value / a[pivot][pivot];
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_exact_line() {
        // y = 2x + 1
        let samples = Array2::from_shape_vec((3, 1), vec![0.0, 1.0, 2.0]).expect("Should build");
        let labels = Array1::from_vec(vec![1.0, 3.0, 5.0]);
        let mut model = LinearRegressionClassifier::default();
        model
            .fit(&samples, &labels, ClassWeighting::Uniform)
            .expect("Should fit");

        let predictions = model.predict(&samples).expect("Should predict");
        for (prediction, &label) in predictions.iter().zip(labels.iter()) {
            assert!((prediction - label).abs() < 1e-4);
        }
    }

    #[test]
    fn test_probability_output_is_unsupported() {
        let samples = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).expect("Should build");
        let labels = Array1::from_vec(vec![-1.0, 1.0]);
        let mut model = LinearRegressionClassifier::default();
        model
            .fit(&samples, &labels, ClassWeighting::Uniform)
            .expect("Should fit");
        assert!(matches!(
            model.predict_probability(&samples),
            Err(ClassifyError::ProbabilityUnsupported { .. })
        ));
    }

    #[test]
    fn test_unfitted_error() {
        let model = LinearRegressionClassifier::default();
        assert!(matches!(
            model.predict(&Array2::zeros((1, 1))),
            Err(ClassifyError::NotFitted)
        ));
    }
}
