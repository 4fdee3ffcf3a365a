//! 2-D layout of embedding vectors with exact t-SNE.
//!
//! Initialisation is a seeded PCA rather than random noise, so the same input
//! and seed always produce the same layout.

use crate::error::{BrwsError, Result};
use crate::vector_ops::{squared_distance_2d, squared_distance_simd, Number, EPSILON};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_distr::StandardNormal;
use rayon::prelude::*;

pub const DEFAULT_PERPLEXITY: f64 = 30.0;
pub const DEFAULT_ITERATIONS: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;

const EARLY_EXAGGERATION: f64 = 12.0;
const EXAGGERATION_ITERATIONS: usize = 250;
const INITIAL_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
const MIN_GAIN: f64 = 0.01;
const MIN_LEARNING_RATE: f64 = 50.0;
const ENTROPY_TOLERANCE: f64 = 1e-5;
const BANDWIDTH_STEPS: usize = 100;
const POWER_ITERATIONS: usize = 300;
const INIT_SCALE: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct Projector {
    pub perplexity: f64,
    pub iterations: usize,
    pub seed: u64,
}

impl Default for Projector {
    fn default() -> Self {
        Self {
            perplexity: DEFAULT_PERPLEXITY,
            iterations: DEFAULT_ITERATIONS,
            seed: DEFAULT_SEED,
        }
    }
}

impl Projector {
    pub fn new(perplexity: f64, iterations: usize, seed: u64) -> Self {
        Self {
            perplexity,
            iterations,
            seed,
        }
    }

    /// Maps the rows of `data` to an N×2 matrix of plot coordinates.
    pub fn project(&self, data: &Array2<Number>) -> Result<Array2<f64>> {
        let n = data.nrows();
        if !self.perplexity.is_finite() || self.perplexity <= 0.0 {
            return Err(BrwsError::Projection(format!(
                "perplexity must be positive, got {}",
                self.perplexity
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(BrwsError::Projection(
                "input vectors contain non-finite values".to_string(),
            ));
        }
        if n < 2 {
            return Ok(Array2::zeros((n, 2)));
        }

        let perplexity = self.perplexity.min((n - 1) as f64 / 3.0).max(1.0);
        log::debug!(
            "Projecting {} vectors of dimension {} (perplexity {:.2}, {} iterations)",
            n,
            data.ncols(),
            perplexity,
            self.iterations
        );

        let p = {
            let distances = pairwise_distances(data)?;
            joint_probabilities(&distances, perplexity)
        };
        let init = pca_init(data, self.seed);
        Ok(self.optimize(&p, init))
    }

    fn optimize(&self, p: &Array2<f64>, mut y: Array2<f64>) -> Array2<f64> {
        let n = y.nrows();
        let learning_rate = (n as f64 / EARLY_EXAGGERATION / 4.0).max(MIN_LEARNING_RATE);
        let mut update = Array2::<f64>::zeros((n, 2));
        let mut gains = Array2::<f64>::ones((n, 2));
        let mut kernel = vec![0.0; n * n];
        let mut grad = vec![0.0; n * 2];

        for iteration in 0..self.iterations {
            let (exaggeration, momentum) = if iteration < EXAGGERATION_ITERATIONS {
                (EARLY_EXAGGERATION, INITIAL_MOMENTUM)
            } else {
                (1.0, FINAL_MOMENTUM)
            };
            gradient(p, &y, exaggeration, &mut kernel, &mut grad);

            for ((g, u), gain) in grad.iter().zip(update.iter_mut()).zip(gains.iter_mut()) {
                if g * *u < 0.0 {
                    *gain += 0.2;
                } else {
                    *gain *= 0.8;
                }
                *gain = gain.max(MIN_GAIN);
                *u = momentum * *u - learning_rate * *gain * g;
            }
            y += &update;
        }

        match y.mean_axis(Axis(0)) {
            Some(mean) => y - &mean,
            None => y,
        }
    }
}

/// Stacks equal-length vectors into an N×D matrix, one row per vector.
pub fn stack_vectors(vectors: &[Vec<Number>]) -> Result<Array2<Number>> {
    let dim = vectors.first().map_or(0, Vec::len);
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(BrwsError::DimensionMismatch {
            expected: dim,
            found: bad.len(),
        });
    }
    let flat: Vec<Number> = vectors.iter().flatten().copied().collect();
    Array2::from_shape_vec((vectors.len(), dim), flat)
        .map_err(|e| BrwsError::Projection(e.to_string()))
}

fn pairwise_distances(data: &Array2<Number>) -> Result<Array2<f64>> {
    let n = data.nrows();
    let rows: Vec<Vec<Number>> = data.outer_iter().map(|row| row.to_vec()).collect();
    let flat: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let rows = &rows;
            (0..n).map(move |j| f64::from(squared_distance_simd(&rows[i], &rows[j])))
        })
        .collect();
    Array2::from_shape_vec((n, n), flat).map_err(|e| BrwsError::Projection(e.to_string()))
}

/// Symmetrised affinities `(P + Pᵀ) / 2N` with per-point bandwidths matched to `perplexity`.
fn joint_probabilities(distances: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = distances.nrows();
    let target_entropy = perplexity.ln();
    let conditional: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let row: Vec<f64> = distances.row(i).to_vec();
            conditional_row(&row, i, target_entropy)
        })
        .collect();

    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.0
        } else {
            ((conditional[i][j] + conditional[j][i]) / (2.0 * n as f64)).max(EPSILON)
        }
    })
}

/// Binary search on the Gaussian precision of point `i` until the entropy of
/// its neighbour distribution matches `target_entropy`.
fn conditional_row(distances: &[f64], i: usize, target_entropy: f64) -> Vec<f64> {
    let n = distances.len();
    let offset = distances
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, d)| *d)
        .fold(f64::INFINITY, f64::min);

    let mut beta = 1.0;
    let mut beta_min = 0.0;
    let mut beta_max = f64::INFINITY;
    let mut row = vec![0.0; n];

    for _ in 0..BANDWIDTH_STEPS {
        let mut sum = 0.0;
        let mut weighted = 0.0;
        for j in 0..n {
            if j == i {
                row[j] = 0.0;
                continue;
            }
            let shifted = distances[j] - offset;
            let value = (-shifted * beta).exp();
            row[j] = value;
            sum += value;
            weighted += shifted * value;
        }
        // The closest neighbour contributes exp(0), so sum >= 1.
        let entropy = sum.ln() + beta * weighted / sum;
        for value in row.iter_mut() {
            *value /= sum;
        }

        let diff = entropy - target_entropy;
        if diff.abs() < ENTROPY_TOLERANCE {
            break;
        }
        if diff > 0.0 {
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = (beta + beta_min) / 2.0;
        }
    }
    row
}

/// Writes the Student-t gradient of KL(P || Q) at `y` into `grad` (row-major,
/// N×2). `kernel` is N×N scratch space; both buffers live across iterations.
fn gradient(
    p: &Array2<f64>,
    y: &Array2<f64>,
    exaggeration: f64,
    kernel: &mut [f64],
    grad: &mut [f64],
) {
    let n = y.nrows();
    let points: Vec<[f64; 2]> = y.outer_iter().map(|r| [r[0], r[1]]).collect();

    kernel
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| {
            for (j, k) in row.iter_mut().enumerate() {
                *k = if i == j {
                    0.0
                } else {
                    1.0 / (1.0 + squared_distance_2d(points[i], points[j]))
                };
            }
        });
    let z = kernel
        .chunks(n)
        .map(|row| row.iter().sum::<f64>())
        .sum::<f64>()
        .max(EPSILON);

    let kernel = &*kernel;
    grad.par_chunks_mut(2).enumerate().for_each(|(i, g)| {
        let mut acc = [0.0; 2];
        for j in 0..n {
            if i == j {
                continue;
            }
            let num = kernel[i * n + j];
            let q = (num / z).max(EPSILON);
            let coeff = (exaggeration * p[[i, j]] - q) * num;
            acc[0] += coeff * (points[i][0] - points[j][0]);
            acc[1] += coeff * (points[i][1] - points[j][1]);
        }
        g[0] = 4.0 * acc[0];
        g[1] = 4.0 * acc[1];
    });
}

/// First two principal components via power iteration with deflation,
/// scaled so the first column has standard deviation `INIT_SCALE`.
fn pca_init(data: &Array2<Number>, seed: u64) -> Array2<f64> {
    let n = data.nrows();
    let d = data.ncols();
    let x = data.mapv(f64::from);
    let centered = match x.mean_axis(Axis(0)) {
        Some(mean) => &x - &mean,
        None => x,
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut residual = centered.clone();
    let mut y = Array2::<f64>::zeros((n, 2));

    for component in 0..2 {
        let mut v: Array1<f64> = (0..d).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();
        normalize(&mut v);

        for _ in 0..POWER_ITERATIONS {
            let mut next = residual.t().dot(&residual.dot(&v));
            let norm = next.dot(&next).sqrt();
            if norm < EPSILON {
                break;
            }
            next /= norm;
            let delta: f64 = (&next - &v).mapv(f64::abs).sum();
            v = next;
            if delta < 1e-10 {
                break;
            }
        }

        let largest = v
            .iter()
            .copied()
            .fold(0.0_f64, |acc, c| if c.abs() > acc.abs() { c } else { acc });
        if largest < 0.0 {
            v.mapv_inplace(|c| -c);
        }

        let scores = residual.dot(&v);
        y.column_mut(component).assign(&scores);
        let projection = scores
            .view()
            .insert_axis(Axis(1))
            .dot(&v.view().insert_axis(Axis(0)));
        residual -= &projection;
    }

    let std = y.column(0).std(0.0);
    if std > EPSILON {
        y.mapv_inplace(|c| c / std * INIT_SCALE);
    }
    y
}

fn normalize(v: &mut Array1<f64>) {
    let norm = v.dot(v).sqrt();
    if norm > EPSILON {
        v.mapv_inplace(|c| c / norm);
    }
}
