//! Exact t-SNE over a precomputed dissimilarity matrix.
//!
//! ```text
//! dissimilarities ──binary search per row──▶ P(j|i) at target perplexity
//!                 ──symmetrize──────────────▶ P(ij)
//! seeded N(0, 1e-4) layout ──gradient descent on KL(P || Q)──▶ Y
//! ```
//!
//! Two optimization phases, as usual for t-SNE: an early-exaggeration phase
//! (P scaled up, momentum 0.5) that lets clusters form, then the main phase
//! (momentum 0.8). Step sizes adapt per component through gains.
//!
//! Cost is O(N²) per iteration in time and memory, which is fine for the
//! sampled subsets this crate is meant for.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::DissimilarityMatrix;
use crate::{Error, Result};
use super::EmbeddingEngine;

/// Floor for probabilities; keeps logarithms finite.
const MACHINE_EPSILON: f64 = f64::EPSILON;

/// Std-dev of the initial random layout.
const INIT_SCALE: f64 = 1e-4;

const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const PERPLEXITY_STEPS: usize = 100;
const MIN_GAIN: f64 = 0.01;
const CHECK_EVERY: usize = 50;

// ============================================================================
// Configuration
// ============================================================================

/// Tuning knobs of `TsneEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsneConfig {
    /// Effective number of neighbours. Clamped to N - 1.
    pub perplexity: f64,
    pub early_exaggeration: f64,
    /// Length of the exaggeration phase.
    pub exaggeration_iterations: usize,
    /// Total iterations, both phases included.
    pub iterations: usize,
    /// `None` picks `max(N / early_exaggeration / 4, 50)`.
    pub learning_rate: Option<f64>,
    /// Stop once the gradient norm falls below this.
    pub min_grad_norm: f64,
    /// Stop when the objective has not improved for this many iterations.
    pub iterations_without_progress: usize,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            early_exaggeration: 12.0,
            exaggeration_iterations: 250,
            iterations: 1000,
            learning_rate: None,
            min_grad_norm: 1e-7,
            iterations_without_progress: 300,
        }
    }
}

impl TsneConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.perplexity.is_finite() && self.perplexity > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "t-SNE perplexity must be positive, got {}",
                self.perplexity
            )));
        }
        if !(self.early_exaggeration.is_finite() && self.early_exaggeration >= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "t-SNE early exaggeration must be at least 1, got {}",
                self.early_exaggeration
            )));
        }
        if self.iterations == 0 {
            return Err(Error::InvalidConfig("t-SNE needs at least one iteration".into()));
        }
        if let Some(rate) = self.learning_rate {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "t-SNE learning rate must be positive, got {rate}"
                )));
            }
        }
        Ok(())
    }

    fn learning_rate_for(&self, n: usize) -> f64 {
        self.learning_rate
            .unwrap_or_else(|| (n as f64 / self.early_exaggeration / 4.0).max(50.0))
    }
}

// ============================================================================
// TsneEngine
// ============================================================================

/// Default `EmbeddingEngine`.
#[derive(Debug, Clone, Default)]
pub struct TsneEngine {
    config: TsneConfig,
}

impl TsneEngine {
    pub fn new(config: TsneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TsneConfig {
        &self.config
    }
}

impl EmbeddingEngine for TsneEngine {
    fn embed(
        &self,
        dissimilarity: &DissimilarityMatrix,
        dims: usize,
        seed: u64,
    ) -> Result<Vec<Vec<f64>>> {
        let n = dissimilarity.dim();
        if dims == 0 {
            return Err(Error::EmbeddingFailure("output dimensionality must be at least 1".into()));
        }
        if n < 2 {
            return Err(Error::EmbeddingFailure(format!("t-SNE needs at least 2 points, got {n}")));
        }
        if dissimilarity.as_slice().iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(Error::EmbeddingFailure(
                "dissimilarities must be finite and non-negative".into(),
            ));
        }
        self.config.validate()?;

        let perplexity = self.config.perplexity.min((n - 1) as f64);
        let p = joint_probabilities(dissimilarity, perplexity);
        let mut y = initial_layout(n, dims, seed)?;

        let objective = Objective { p: &p, n, dims };
        let rate = self.config.learning_rate_for(n);
        let exaggeration_iters = self.config.exaggeration_iterations.min(self.config.iterations);

        let mut exaggerated = p.clone();
        for v in exaggerated.iter_mut() {
            *v *= self.config.early_exaggeration;
        }
        let explore = Objective { p: &exaggerated, n, dims };
        let mut it = descend(&explore, &mut y, 0, exaggeration_iters, 0.5, rate, &self.config);
        debug!(iterations = it, "t-SNE exaggeration phase done");

        it = descend(&objective, &mut y, it, self.config.iterations, 0.8, rate, &self.config);
        let kl = objective.evaluate(&y, &mut vec![0.0; y.len()], true);
        debug!(iterations = it, kl, "t-SNE optimization done");

        if !kl.is_finite() || y.iter().any(|v| !v.is_finite()) {
            return Err(Error::EmbeddingFailure(format!(
                "t-SNE did not converge (KL divergence {kl} after {it} iterations)"
            )));
        }
        Ok(y.chunks_exact(dims).map(<[f64]>::to_vec).collect())
    }
}

// ============================================================================
// Input affinities
// ============================================================================

/// Conditional probabilities of row `i` at precision `beta`, and their entropy.
fn row_distribution(d: &[f64], i: usize, beta: f64, out: &mut [f64]) -> f64 {
    let mut sum = 0.0;
    for (j, (&dij, pj)) in d.iter().zip(out.iter_mut()).enumerate() {
        *pj = if j == i { 0.0 } else { (-dij * beta).exp() };
        sum += *pj;
    }
    let sum = sum.max(1e-8);
    let mut weighted = 0.0;
    for (&dij, pj) in d.iter().zip(out.iter_mut()) {
        *pj /= sum;
        weighted += dij * *pj;
    }
    sum.ln() + beta * weighted
}

/// Symmetric joint probabilities P, row-major N×N, zero diagonal.
fn joint_probabilities(d: &DissimilarityMatrix, perplexity: f64) -> Vec<f64> {
    let n = d.dim();
    let target = perplexity.ln();
    let mut conditional = vec![0.0; n * n];

    for (i, row) in d.rows().enumerate() {
        let out = &mut conditional[i * n..(i + 1) * n];
        let (mut beta, mut lo, mut hi) = (1.0f64, f64::NEG_INFINITY, f64::INFINITY);
        for _ in 0..PERPLEXITY_STEPS {
            let diff = row_distribution(row, i, beta, out) - target;
            if diff.abs() <= PERPLEXITY_TOLERANCE {
                break;
            }
            if diff > 0.0 {
                lo = beta;
                beta = if hi.is_infinite() { beta * 2.0 } else { (beta + hi) / 2.0 };
            } else {
                hi = beta;
                beta = if lo.is_infinite() { beta / 2.0 } else { (beta + lo) / 2.0 };
            }
        }
    }

    let mut joint = vec![0.0; n * n];
    let mut total = 0.0;
    for i in 0..n {
        for j in 0..n {
            let v = conditional[i * n + j] + conditional[j * n + i];
            joint[i * n + j] = v;
            total += v;
        }
    }
    let total = total.max(MACHINE_EPSILON);
    for i in 0..n {
        for j in 0..n {
            let cell = &mut joint[i * n + j];
            *cell = if i == j { 0.0 } else { (*cell / total).max(MACHINE_EPSILON) };
        }
    }
    joint
}

fn initial_layout(n: usize, dims: usize, seed: u64) -> Result<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, INIT_SCALE)
        .map_err(|e| Error::EmbeddingFailure(format!("initial layout: {e}")))?;
    Ok((0..n * dims).map(|_| normal.sample(&mut rng)).collect())
}

// ============================================================================
// Objective and optimizer
// ============================================================================

/// KL(P || Q) with Student-t output affinities.
struct Objective<'a> {
    p: &'a [f64],
    n: usize,
    dims: usize,
}

impl Objective<'_> {
    /// Write the gradient into `grad`; return the KL divergence when
    /// `with_error` is set, NaN otherwise.
    fn evaluate(&self, y: &[f64], grad: &mut [f64], with_error: bool) -> f64 {
        let (n, dims) = (self.n, self.dims);
        let mut num = vec![0.0; n * n];
        let mut sum_num = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let sq: f64 = (0..dims)
                    .map(|k| {
                        let diff = y[i * dims + k] - y[j * dims + k];
                        diff * diff
                    })
                    .sum();
                let v = 1.0 / (1.0 + sq);
                num[i * n + j] = v;
                num[j * n + i] = v;
                sum_num += 2.0 * v;
            }
        }
        let sum_num = sum_num.max(MACHINE_EPSILON);

        grad.fill(0.0);
        let mut kl = 0.0;
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let nij = num[i * n + j];
                let q = (nij / sum_num).max(MACHINE_EPSILON);
                let pij = self.p[i * n + j];
                if with_error {
                    kl += pij * (pij.max(MACHINE_EPSILON) / q).ln();
                }
                let coeff = 4.0 * (pij - q) * nij;
                for k in 0..dims {
                    grad[i * dims + k] += coeff * (y[i * dims + k] - y[j * dims + k]);
                }
            }
        }
        if with_error { kl } else { f64::NAN }
    }
}

/// Momentum gradient descent with adaptive gains from iteration `start` up to
/// `end`. Returns the iteration it stopped at.
fn descend(
    objective: &Objective<'_>,
    y: &mut [f64],
    start: usize,
    end: usize,
    momentum: f64,
    learning_rate: f64,
    config: &TsneConfig,
) -> usize {
    let mut update = vec![0.0; y.len()];
    let mut gains = vec![1.0f64; y.len()];
    let mut grad = vec![0.0; y.len()];
    let mut best_error = f64::INFINITY;
    let mut best_iter = start;

    let mut it = start;
    while it < end {
        let check = (it + 1) % CHECK_EVERY == 0 || it + 1 == end;
        let error = objective.evaluate(y, &mut grad, check);

        for ((g, u), gain) in grad.iter_mut().zip(update.iter_mut()).zip(gains.iter_mut()) {
            *gain = if *u * *g < 0.0 { *gain + 0.2 } else { *gain * 0.8 };
            *gain = gain.max(MIN_GAIN);
            *g *= *gain;
            *u = momentum * *u - learning_rate * *g;
        }
        for (yi, u) in y.iter_mut().zip(update.iter()) {
            *yi += u;
        }
        it += 1;

        if check {
            let grad_norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
            if error < best_error {
                best_error = error;
                best_iter = it;
            } else if it - best_iter > config.iterations_without_progress {
                debug!(iteration = it, error, "t-SNE stalled");
                break;
            }
            if grad_norm <= config.min_grad_norm {
                debug!(iteration = it, grad_norm, "t-SNE gradient vanished");
                break;
            }
        }
    }
    it
}
