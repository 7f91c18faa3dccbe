//! Kernel support-vector machine.
//!
//! Fitting uses sequential minimal optimization over the dual problem with
//! per-sample box constraints (so class weights tighten or loosen the
//! penalty per class), and the whole procedure is deterministic: the first
//! multiplier is chosen by sweep order, the second by the largest error
//! gap. Probabilities come from a logistic link fitted to the training
//! decision values.

use ndarray::{Array1, Array2};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString, VariantNames};
use tracing::debug;

use crate::classifier::{
    ClassWeighting, Classifier, probability_rows, require_both_classes, sigmoid,
    validate_training_set,
};
use crate::error::{ClassifyError, Result};

/// SVM kernel selector.
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
pub enum SvmKernel {
    Linear,
    #[default]
    Rbf,
    Polynomial,
}

impl SvmKernel {
    /// Parse a selector, failing fast with the invalid value and the
    /// accepted set.
    pub fn parse(selector: &str) -> Result<Self> {
        Self::from_str(selector).map_err(|_| ClassifyError::UnknownKernel {
            selector: selector.to_string(),
            expected: Self::VARIANTS.join(", "),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    pub kernel: SvmKernel,
    /// Box-constraint penalty, scaled per sample by the class weight.
    pub penalty: f64,
    /// Kernel coefficient; `None` resolves to `1 / n_features` at fit.
    pub gamma: Option<f64>,
    pub degree: u32,
    pub coef0: f64,
    /// KKT violation tolerance.
    pub tolerance: f64,
    /// Bound on full optimization sweeps.
    pub max_sweeps: usize,
    model: Option<SvmModel>,
}

impl Default for SvmClassifier {
    fn default() -> Self {
        Self {
            kernel: SvmKernel::default(),
            penalty: 1.0,
            gamma: None,
            degree: 3,
            coef0: 0.0,
            tolerance: 1e-3,
            max_sweeps: 100,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SvmModel {
    support_vectors: Vec<Vec<f64>>,
    /// `alpha_i * y_i` per support vector.
    coefficients: Vec<f64>,
    bias: f64,
    gamma: f64,
    /// Logistic link `(a, b)`: `p = sigmoid(-(a * f + b))`.
    platt: (f64, f64),
}

impl SvmClassifier {
    pub fn with_kernel(kernel: SvmKernel) -> Self {
        Self {
            kernel,
            ..Self::default()
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn kernel_value(&self, gamma: f64, a: &[f64], b: &[f64]) -> f64 {
        match self.kernel {
            SvmKernel::Linear => dot(a, b),
            SvmKernel::Rbf => {
                let squared: f64 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| {
                        let d = x - y;
                        d * d
                    })
                    .sum();
                (-gamma * squared).exp()
            }
            SvmKernel::Polynomial => (gamma * dot(a, b) + self.coef0).powi(self.degree as i32),
        }
    }

    /// Raw decision values `f(x)` for each sample row.
    pub fn decision_values(&self, samples: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or(ClassifyError::NotFitted)?;
        let values: Vec<f64> = samples
            .rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                model
                    .support_vectors
                    .iter()
                    .zip(&model.coefficients)
                    .map(|(sv, &coefficient)| {
                        coefficient * self.kernel_value(model.gamma, sv, &row)
                    })
                    .sum::<f64>()
                    + model.bias
            })
            .collect();
        Ok(Array1::from_vec(values))
    }
}

impl Classifier for SvmClassifier {
    fn fit(
        &mut self,
        samples: &Array2<f64>,
        labels: &Array1<f64>,
        weighting: ClassWeighting,
    ) -> Result<()> {
        validate_training_set(samples, labels)?;
        require_both_classes(labels)?;

        let n = samples.nrows();
        let gamma = self
            .gamma
            .unwrap_or_else(|| 1.0 / samples.ncols().max(1) as f64);
        let x: Vec<Vec<f64>> = samples.rows().into_iter().map(|row| row.to_vec()).collect();
        let y: Vec<f64> = labels.to_vec();
        let (weight_negative, weight_positive) = weighting.resolve(labels);
        let box_of: Vec<f64> = y
            .iter()
            .map(|&label| {
                self.penalty
                    * if label > 0.0 {
                        weight_positive
                    } else {
                        weight_negative
                    }
            })
            .collect();

        let mut kernel = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let value = self.kernel_value(gamma, &x[i], &x[j]);
                kernel[i][j] = value;
                kernel[j][i] = value;
            }
        }

        let mut alpha = vec![0.0; n];
        let mut bias = 0.0;
        // errors[i] = f(x_i) - y_i; all alphas start at zero
        let mut errors: Vec<f64> = y.iter().map(|&label| -label).collect();

        let mut sweeps = 0;
        loop {
            let mut changed = 0;
            for i in 0..n {
                let e_i = errors[i];
                let violation = y[i] * e_i;
                let violates = (violation < -self.tolerance && alpha[i] < box_of[i])
                    || (violation > self.tolerance && alpha[i] > 0.0);
                if !violates {
                    continue;
                }

                // second multiplier: largest error gap
                let mut second = None;
                let mut best_gap = 0.0;
                for (j, &e_j) in errors.iter().enumerate() {
                    if j == i {
                        continue;
                    }
                    let gap = (e_i - e_j).abs();
                    if gap > best_gap {
                        best_gap = gap;
                        second = Some(j);
                    }
                }
                let Some(j) = second else { continue };

                let (low, high) = if y[i] * y[j] < 0.0 {
                    (
                        (alpha[j] - alpha[i]).max(0.0),
                        box_of[j].min(box_of[i] - alpha[i] + alpha[j]),
                    )
                } else {
                    (
                        (alpha[i] + alpha[j] - box_of[i]).max(0.0),
                        box_of[j].min(alpha[i] + alpha[j]),
                    )
                };
                if high - low < 1e-12 {
                    continue;
                }
                let eta = 2.0 * kernel[i][j] - kernel[i][i] - kernel[j][j];
                if eta >= 0.0 {
                    continue;
                }

                let updated_j = (alpha[j] - y[j] * (e_i - errors[j]) / eta).clamp(low, high);
                if (updated_j - alpha[j]).abs() < 1e-8 {
                    continue;
                }
                let updated_i = alpha[i] + y[i] * y[j] * (alpha[j] - updated_j);
                let delta_i = updated_i - alpha[i];
                let delta_j = updated_j - alpha[j];

                let b1 = bias
                    - e_i
                    - y[i] * delta_i * kernel[i][i]
                    - y[j] * delta_j * kernel[i][j];
                let b2 = bias
                    - errors[j]
                    - y[i] * delta_i * kernel[i][j]
                    - y[j] * delta_j * kernel[j][j];
                let updated_bias = if updated_i > 0.0 && updated_i < box_of[i] {
                    b1
                } else if updated_j > 0.0 && updated_j < box_of[j] {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };
                let delta_bias = updated_bias - bias;

                alpha[i] = updated_i;
                alpha[j] = updated_j;
                bias = updated_bias;
                for (t, error) in errors.iter_mut().enumerate() {
                    *error +=
                        y[i] * delta_i * kernel[i][t] + y[j] * delta_j * kernel[j][t] + delta_bias;
                }
                changed += 1;
            }
            sweeps += 1;
            if changed == 0 || sweeps >= self.max_sweeps {
                break;
            }
        }
        debug!(sweeps, "svm optimization finished");

        let decisions: Vec<f64> = (0..n).map(|i| errors[i] + y[i]).collect();
        let platt = fit_logistic_link(&decisions, &y);

        let mut support_vectors = Vec::new();
        let mut coefficients = Vec::new();
        for i in 0..n {
            if alpha[i] > 1e-12 {
                support_vectors.push(x[i].clone());
                coefficients.push(alpha[i] * y[i]);
            }
        }
        self.model = Some(SvmModel {
            support_vectors,
            coefficients,
            bias,
            gamma,
            platt,
        });
        Ok(())
    }

    fn predict_probability(&self, samples: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self.model.as_ref().ok_or(ClassifyError::NotFitted)?;
        let (a, b) = model.platt;
        let positive: Vec<f64> = self
            .decision_values(samples)?
            .iter()
            .map(|&f| sigmoid(-(a * f + b)))
            .collect();
        Ok(probability_rows(&positive))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Fit `p = sigmoid(-(a * f + b))` to the training decision values, with
/// the usual prior-corrected targets to keep probabilities off 0 and 1.
fn fit_logistic_link(decisions: &[f64], labels: &[f64]) -> (f64, f64) {
    let positives = labels.iter().filter(|&&label| label > 0.0).count() as f64;
    let negatives = labels.len() as f64 - positives;
    let target_positive = (positives + 1.0) / (positives + 2.0);
    let target_negative = 1.0 / (negatives + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&label| {
            if label > 0.0 {
                target_positive
            } else {
                target_negative
            }
        })
        .collect();

    let n = decisions.len() as f64;
    let rate = 0.01;
    let mut a = -1.0;
    let mut b = 0.0;
    for _ in 0..500 {
        let mut gradient_a = 0.0;
        let mut gradient_b = 0.0;
        for (i, &f) in decisions.iter().enumerate() {
            let p = sigmoid(-(a * f + b));
            gradient_a += (targets[i] - p) * f;
            gradient_b += targets[i] - p;
        }
        a -= rate * gradient_a / n;
        b -= rate * gradient_b / n;
    }
    (a, b)
}
