//! Multiclass linear trainers behind the `Train` step.
//!
//! Two one-vs-all strategies over the hashed sparse feature space: dual
//! coordinate ascent with smoothed hinge loss (SDCA) and the averaged
//! perceptron. Both are deterministic for a fixed seed and produce a
//! [`TrainedClassifier`] with dense per-class weights and softmax scores.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::pipeline::text::SparseVector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdcaOptions {
    /// Maximum full passes over the training set
    pub max_iter: usize,
    /// Stop when the largest dual update in an epoch falls below this
    pub tol: f32,
    /// L2 regularization strength
    pub lambda: f32,
    /// Smoothing of the hinge loss
    pub smoothing: f32,
    pub seed: u64,
}

impl Default for SdcaOptions {
    fn default() -> Self {
        Self {
            max_iter: 30,
            tol: 1e-4,
            lambda: 1e-5,
            smoothing: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptronOptions {
    /// Full passes over the training set
    pub iters: usize,
    pub seed: u64,
}

impl Default for PerceptronOptions {
    fn default() -> Self {
        Self { iters: 10, seed: 42 }
    }
}

/// Which learner the `Train` step delegates to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainerStrategy {
    /// One-vs-all stochastic dual coordinate ascent, smoothed hinge loss
    SdcaMulticlass(SdcaOptions),
    /// One-vs-all averaged perceptron
    OvaAveragedPerceptron(PerceptronOptions),
}

impl Default for TrainerStrategy {
    fn default() -> Self {
        TrainerStrategy::SdcaMulticlass(SdcaOptions::default())
    }
}

impl TrainerStrategy {
    /// Short name used in reports and artifacts.
    pub fn name(&self) -> &'static str {
        match self {
            TrainerStrategy::SdcaMulticlass(_) => "sdca",
            TrainerStrategy::OvaAveragedPerceptron(_) => "averaged-perceptron",
        }
    }

    /// Fits per-class weights over `features`/`labels`, where each label is
    /// an encoded key in `0..n_classes`.
    pub fn fit(
        &self,
        features: &[SparseVector],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<TrainedClassifier> {
        if features.is_empty() {
            return Err(PipelineError::Training("empty training set".to_string()));
        }
        if features.len() != labels.len() {
            return Err(PipelineError::Training(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if n_classes == 0 {
            return Err(PipelineError::Training("no label classes".to_string()));
        }
        let dims = features[0].dims;
        let weights = match self {
            TrainerStrategy::SdcaMulticlass(opts) => {
                fit_sdca(features, labels, n_classes, dims, opts)
            }
            TrainerStrategy::OvaAveragedPerceptron(opts) => {
                fit_averaged_perceptron(features, labels, n_classes, dims, opts)
            }
        };
        Ok(TrainedClassifier {
            strategy: self.clone(),
            weights: weights.0,
            bias: weights.1,
        })
    }
}

/// Learned per-class linear model. `weights` is `n_classes x dims`; scores
/// are softmax-normalized margins so log-loss is well-defined for either
/// strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedClassifier {
    pub strategy: TrainerStrategy,
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

impl TrainedClassifier {
    pub fn n_classes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn dims(&self) -> usize {
        self.weights.ncols()
    }

    /// Per-class probabilities for one feature vector.
    pub fn scores(&self, x: &SparseVector) -> Vec<f32> {
        let margins: Vec<f32> = (0..self.n_classes())
            .map(|c| {
                let row = self.weights.row(c);
                let dot = match row.as_slice() {
                    Some(dense) => x.dot_dense(dense),
                    None => x
                        .indices
                        .iter()
                        .zip(&x.values)
                        .map(|(&i, &v)| v * row[i as usize])
                        .sum(),
                };
                dot + self.bias[c]
            })
            .collect();
        softmax(&margins)
    }

    /// Highest-scoring class key and the full score vector.
    pub fn predict(&self, x: &SparseVector) -> (usize, Vec<f32>) {
        let scores = self.scores(x);
        let best = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        (best, scores)
    }
}

fn softmax(margins: &[f32]) -> Vec<f32> {
    let max = margins.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// One-vs-all SDCA with smoothed hinge loss. Each class keeps one dual
/// variable per sample; the primal weights are maintained incrementally so
/// one epoch is a single shuffled sweep over the samples.
fn fit_sdca(
    features: &[SparseVector],
    labels: &[usize],
    n_classes: usize,
    dims: usize,
    opts: &SdcaOptions,
) -> (Array2<f32>, Array1<f32>) {
    let n = features.len();
    let lambda_n = opts.lambda * n as f32;
    // Squared norms include the implicit bias coordinate.
    let norms: Vec<f32> = features.iter().map(|x| x.squared_norm() + 1.0).collect();

    let mut weights = Array2::<f32>::zeros((n_classes, dims));
    let mut bias = Array1::<f32>::zeros(n_classes);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(opts.seed);
    let mut indices: Vec<usize> = (0..n).collect();

    for class in 0..n_classes {
        let mut alpha = vec![0.0f32; n];
        let mut w = vec![0.0f32; dims];
        let mut b = 0.0f32;

        for _epoch in 0..opts.max_iter {
            indices.shuffle(&mut rng);
            let mut max_delta = 0.0f32;

            for &i in &indices {
                let x = &features[i];
                let y = if labels[i] == class { 1.0f32 } else { -1.0f32 };
                let margin = y * (x.dot_dense(&w) + b);
                let delta = ((1.0 - margin - opts.smoothing * alpha[i])
                    / (norms[i] / lambda_n + opts.smoothing))
                    .clamp(-alpha[i], 1.0 - alpha[i]);
                if delta != 0.0 {
                    alpha[i] += delta;
                    let scale = delta * y / lambda_n;
                    for (&idx, &v) in x.indices.iter().zip(&x.values) {
                        w[idx as usize] += scale * v;
                    }
                    b += scale;
                    max_delta = max_delta.max(delta.abs());
                }
            }

            if max_delta < opts.tol {
                break;
            }
        }

        weights.row_mut(class).assign(&Array1::from_vec(w));
        bias[class] = b;
    }

    (weights, bias)
}

/// One-vs-all averaged perceptron, using the lagged-average trick so the
/// running average costs one extra sparse update per mistake.
fn fit_averaged_perceptron(
    features: &[SparseVector],
    labels: &[usize],
    n_classes: usize,
    dims: usize,
    opts: &PerceptronOptions,
) -> (Array2<f32>, Array1<f32>) {
    let n = features.len();
    let mut weights = Array2::<f32>::zeros((n_classes, dims));
    let mut bias = Array1::<f32>::zeros(n_classes);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(opts.seed);
    let mut indices: Vec<usize> = (0..n).collect();

    for class in 0..n_classes {
        let mut w = vec![0.0f32; dims];
        let mut u = vec![0.0f32; dims];
        let mut b = 0.0f32;
        let mut ub = 0.0f32;
        let mut t = 1.0f32;

        for _epoch in 0..opts.iters {
            indices.shuffle(&mut rng);
            for &i in &indices {
                let x = &features[i];
                let y = if labels[i] == class { 1.0f32 } else { -1.0f32 };
                if y * (x.dot_dense(&w) + b) <= 0.0 {
                    for (&idx, &v) in x.indices.iter().zip(&x.values) {
                        w[idx as usize] += y * v;
                        u[idx as usize] += y * v * t;
                    }
                    b += y;
                    ub += y * t;
                }
                t += 1.0;
            }
        }

        let averaged: Vec<f32> = w
            .iter()
            .zip(&u)
            .map(|(&wi, &ui)| wi - ui / t)
            .collect();
        weights.row_mut(class).assign(&Array1::from_vec(averaged));
        bias[class] = b - ub / t;
    }

    (weights, bias)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dims: usize, index: u32) -> SparseVector {
        SparseVector {
            dims,
            indices: vec![index],
            values: vec![1.0],
        }
    }

    fn separable_data() -> (Vec<SparseVector>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..20 {
            features.push(unit(8, 0));
            labels.push(0);
            features.push(unit(8, 1));
            labels.push(1);
            features.push(unit(8, 2));
            labels.push(2);
        }
        (features, labels)
    }

    #[test]
    fn test_sdca_separates_classes() {
        let (features, labels) = separable_data();
        let model = TrainerStrategy::default()
            .fit(&features, &labels, 3)
            .unwrap();
        for (x, &label) in features.iter().zip(&labels) {
            let (predicted, scores) = model.predict(x);
            assert_eq!(predicted, label);
            assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_perceptron_separates_classes() {
        let (features, labels) = separable_data();
        let strategy = TrainerStrategy::OvaAveragedPerceptron(PerceptronOptions::default());
        let model = strategy.fit(&features, &labels, 3).unwrap();
        for (x, &label) in features.iter().zip(&labels) {
            assert_eq!(model.predict(x).0, label);
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (features, labels) = separable_data();
        let strategy = TrainerStrategy::default();
        let a = strategy.fit(&features, &labels, 3).unwrap();
        let b = strategy.fit(&features, &labels, 3).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
    }

    #[test]
    fn test_empty_training_set_rejected() {
        let result = TrainerStrategy::default().fit(&[], &[], 1);
        assert!(matches!(result, Err(PipelineError::Training(_))));
    }

    #[test]
    fn test_unseen_bucket_scores_uniformly() {
        let (features, labels) = separable_data();
        let model = TrainerStrategy::default()
            .fit(&features, &labels, 3)
            .unwrap();
        // A vector in a bucket no training row touched gets no class margin,
        // so scores stay finite and sum to one.
        let scores = model.scores(&unit(8, 7));
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_label_count_mismatch_rejected() {
        let features = vec![unit(8, 0)];
        let result = TrainerStrategy::default().fit(&features, &[0, 1], 2);
        assert!(result.is_err());
    }
}
