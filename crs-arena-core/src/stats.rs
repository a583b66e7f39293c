//! Statistics primitives: mean, population standard deviation, Pearson and
//! Spearman correlation.
//!
//! Degenerate inputs (empty, mismatched lengths, zero variance) are not errors.
//! They yield `f64::NAN`, which propagates through every aggregation level.

use serde::{Deserialize, Serialize};

/// Arithmetic mean. `NaN` for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation (divides by N, not N - 1).
pub fn standard_deviation(xs: &[f64]) -> f64 {
    let avg = mean(xs);
    let squared: Vec<f64> = xs.iter().map(|x| (x - avg).powi(2)).collect();
    mean(&squared).sqrt()
}

/// Divide by the largest magnitude so sums of squares stay in range for
/// very large or very small finite inputs. Correlation is scale invariant.
fn normalized(xs: &[f64]) -> Vec<f64> {
    let peak = xs.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if peak > 0.0 && peak.is_finite() {
        xs.iter().map(|v| v / peak).collect()
    } else {
        xs.to_vec()
    }
}

/// Pearson correlation coefficient.
///
/// Returns `NaN` when the lengths differ, the input is empty, or either
/// vector has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.is_empty() {
        return f64::NAN;
    }

    let x = normalized(x);
    let y = normalized(y);
    let mean_x = mean(&x);
    let mean_y = mean(&y);

    let mut numerator = 0.0;
    let mut sum_x_sq = 0.0;
    let mut sum_y_sq = 0.0;

    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        numerator += dx * dy;
        sum_x_sq += dx * dx;
        sum_y_sq += dy * dy;
    }

    let denominator = (sum_x_sq * sum_y_sq).sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }

    numerator / denominator
}

/// 1-based ascending ranks; tied values share the average of the ranks they span.
///
/// `rank(&[5.0, 5.0, 5.0]) == [2.0, 2.0, 2.0]`.
pub fn rank(xs: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..xs.len()).collect();
    order.sort_by(|&a, &b| xs[a].total_cmp(&xs[b]));

    let mut ranks = vec![0.0; xs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j < order.len() && xs[order[j]] == xs[order[i]] {
            j += 1;
        }
        // Positions i..j hold ranks i+1..=j.
        let shared = (i + j + 1) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = shared;
        }
        i = j;
    }
    ranks
}

/// Spearman rank correlation: Pearson over `rank(x)` and `rank(y)`.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.is_empty() {
        return f64::NAN;
    }
    pearson(&rank(x), &rank(y))
}

/// Pearson and Spearman for one bucket of matched (prediction, gold) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    #[serde(with = "nan_as_null")]
    pub pearson: f64,
    #[serde(with = "nan_as_null")]
    pub spearman: f64,
    /// Number of matched pairs the coefficients were computed over.
    pub n: usize,
}

impl Correlation {
    /// Both coefficients undefined; used for buckets with no pairs.
    pub fn undefined() -> Self {
        Self {
            pearson: f64::NAN,
            spearman: f64::NAN,
            n: 0,
        }
    }

    pub fn from_pairs(predictions: &[f64], gold: &[f64]) -> Self {
        if predictions.is_empty() {
            return Self::undefined();
        }
        Self {
            pearson: pearson(predictions, gold),
            spearman: spearman(predictions, gold),
            n: predictions.len(),
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.pearson.is_nan() || !self.spearman.is_nan()
    }
}

/// Serde adapter mapping `NaN` to `null` and back, so undefined metrics
/// survive a JSON round trip.
pub mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
