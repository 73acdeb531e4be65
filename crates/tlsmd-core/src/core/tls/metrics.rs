//! Goodness-of-fit statistics comparing observed and model-predicted displacement tensors.
//!
//! Every per-tensor metric requires positive-definite input and returns `None`
//! otherwise; aggregates skip undefined values.

use super::tensors::{min_eigenvalue, sorted_symmetric_eigen, symmetric_components};
use nalgebra::Matrix3;
use std::f64::consts::PI;

/// Tensors whose smallest eigenvalue does not exceed this are treated as singular.
const POSITIVE_DEFINITE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanSigma {
    pub mean: f64,
    /// Population standard deviation.
    pub sigma: f64,
}

impl MeanSigma {
    /// Mean and standard deviation of `values`, or `None` when there are none.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let values: Vec<f64> = values.into_iter().collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            sigma: variance.sqrt(),
        })
    }
}

fn is_positive_definite(m: &Matrix3<f64>) -> bool {
    m.iter().all(|v| v.is_finite()) && min_eigenvalue(m) > POSITIVE_DEFINITE_EPSILON
}

/// Squared probability distance between the Gaussian densities of `u` and `v`.
///
/// Zero for identical tensors, positive otherwise.
pub fn calc_dp2(u: &Matrix3<f64>, v: &Matrix3<f64>) -> Option<f64> {
    if !is_positive_definite(u) || !is_positive_definite(v) {
        return None;
    }
    let inv_u = u.try_inverse()?;
    let inv_v = v.try_inverse()?;
    let det_inv_u = inv_u.determinant();
    let det_inv_v = inv_v.determinant();
    let det_sum = (inv_u + inv_v).determinant();
    if det_sum <= 0.0 {
        return None;
    }

    let pi3 = PI * PI * PI;
    let pu2 = (det_inv_u / (64.0 * pi3)).sqrt();
    let pv2 = (det_inv_v / (64.0 * pi3)).sqrt();
    let puv = (det_inv_u * det_inv_v / (8.0 * pi3 * det_sum)).sqrt();
    Some(pu2 + pv2 - 2.0 * puv)
}

/// Correlation coefficient of the densities of `u` and `v`; 1.0 for identical tensors.
pub fn calc_cc(u: &Matrix3<f64>, v: &Matrix3<f64>) -> Option<f64> {
    if !is_positive_definite(u) || !is_positive_definite(v) {
        return None;
    }
    let inv_u = u.try_inverse()?;
    let inv_v = v.try_inverse()?;
    let det_sum = (inv_u + inv_v).determinant();
    if det_sum <= 0.0 {
        return None;
    }
    let numerator = (inv_u.determinant() * inv_v.determinant()).sqrt().sqrt();
    Some(numerator / (det_sum / 8.0).sqrt())
}

fn isotropic_equivalent(u: &Matrix3<f64>) -> Matrix3<f64> {
    Matrix3::identity() * (u.trace() / 3.0)
}

/// Shape similarity of two ellipsoids with their size difference removed.
///
/// Normalized by how far each tensor is from its own isotropic equivalent.
pub fn calc_suij(u: &Matrix3<f64>, v: &Matrix3<f64>) -> Option<f64> {
    let eq_u = u.trace() / 3.0;
    let eq_v = v.trace() / 3.0;
    if eq_u <= 0.0 || eq_v <= 0.0 {
        return None;
    }
    let scaled_v = v * (eq_u / eq_v);
    let cc_uv = calc_cc(u, &scaled_v)?;
    let cc_u = calc_cc(u, &isotropic_equivalent(u))?;
    let cc_v = calc_cc(v, &isotropic_equivalent(v))?;
    let denominator = cc_u * cc_v;
    (denominator > 0.0).then(|| cc_uv / denominator)
}

/// Ratio of the smallest to the largest eigenvalue; 1.0 is isotropic.
pub fn calc_anisotropy(u: &Matrix3<f64>) -> Option<f64> {
    let (values, _) = sorted_symmetric_eigen(u);
    (values[2] > POSITIVE_DEFINITE_EPSILON).then(|| values[0] / values[2])
}

/// Σ|U − U_tls| / Σ|U| over the six independent components of every pair.
pub fn calc_r_factor<'a>(
    pairs: impl IntoIterator<Item = (&'a Matrix3<f64>, &'a Matrix3<f64>)>,
) -> Option<f64> {
    let mut delta = 0.0;
    let mut total = 0.0;
    for (observed, predicted) in pairs {
        let o = symmetric_components(observed);
        let p = symmetric_components(predicted);
        for k in 0..6 {
            delta += (o[k] - p[k]).abs();
            total += o[k].abs();
        }
    }
    (total > 0.0).then(|| delta / total)
}
