//! TLS tensor storage, the forward displacement model and origin transforms.
//!
//! Conventions: T in Å², L in rad², S in rad·Å. The shift matrix of a vector
//! `v = (x, y, z)` is the antisymmetric matrix
//!
//! ```text
//!     |  0   z  -y |
//! A = | -z   0   x |
//!     |  y  -x   0 |
//! ```
//!
//! and the displacement predicted at `v` (relative to the origin) is
//! `U = T + A·L·Aᵗ + A·S + Sᵗ·Aᵗ`.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};

/// The three TLS tensors describing a rigid-body motion about some origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TlsTensors {
    pub t: Matrix3<f64>,
    pub l: Matrix3<f64>,
    pub s: Matrix3<f64>,
}

impl Default for TlsTensors {
    fn default() -> Self {
        Self {
            t: Matrix3::zeros(),
            l: Matrix3::zeros(),
            s: Matrix3::zeros(),
        }
    }
}

impl TlsTensors {
    pub fn new(t: Matrix3<f64>, l: Matrix3<f64>, s: Matrix3<f64>) -> Self {
        Self { t, l, s }
    }

    /// Returns the equivalent tensors about `origin + rho`.
    ///
    /// L is invariant. `S' = S + L·Pᵗ` and `T' = T + P·S + Sᵗ·Pᵗ + P·L·Pᵗ`,
    /// where `P` is the shift matrix of `rho`. Predicted displacements are
    /// unchanged for every atom.
    pub fn shift_origin(&self, rho: &Vector3<f64>) -> Self {
        let p = shift_matrix(rho);
        let pt = p.transpose();
        let s = self.s + self.l * pt;
        let t = self.t + p * self.s + self.s.transpose() * pt + p * self.l * pt;
        Self {
            t: symmetrize(&t),
            l: self.l,
            s,
        }
    }

    /// Rotates all three tensors into the frame whose axes are the columns of `r`.
    ///
    /// S is an axial quantity; a left-handed `r` flips its sign.
    pub fn rotate_into(&self, r: &Matrix3<f64>) -> Self {
        let rt = r.transpose();
        let handedness = if r.determinant() < 0.0 { -1.0 } else { 1.0 };
        Self {
            t: symmetrize(&(rt * self.t * r)),
            l: symmetrize(&(rt * self.l * r)),
            s: rt * self.s * r * handedness,
        }
    }
}

/// Builds a symmetric matrix from its six independent components.
pub fn symmetric(a11: f64, a22: f64, a33: f64, a12: f64, a13: f64, a23: f64) -> Matrix3<f64> {
    Matrix3::new(a11, a12, a13, a12, a22, a23, a13, a23, a33)
}

/// The six independent components of a symmetric matrix: `[11, 22, 33, 12, 13, 23]`.
pub fn symmetric_components(m: &Matrix3<f64>) -> [f64; 6] {
    [
        m[(0, 0)],
        m[(1, 1)],
        m[(2, 2)],
        m[(0, 1)],
        m[(0, 2)],
        m[(1, 2)],
    ]
}

/// Builds a trace-free S from the two diagonal differences and the six off-diagonal terms.
///
/// The diagonal is derived as `s22 = (2·(S22−S11) + (S11−S33)) / 3`,
/// `s11 = s22 − (S22−S11)`, `s33 = s11 − (S11−S33)`, so the trace vanishes by
/// construction. This is the same parameterization the least-squares fit solves for.
#[allow(clippy::too_many_arguments)]
pub fn trace_free_s(
    s2211: f64,
    s1133: f64,
    s12: f64,
    s13: f64,
    s23: f64,
    s21: f64,
    s31: f64,
    s32: f64,
) -> Matrix3<f64> {
    let s22 = (2.0 * s2211 + s1133) / 3.0;
    let s11 = s22 - s2211;
    let s33 = s11 - s1133;
    Matrix3::new(s11, s12, s13, s21, s22, s23, s31, s32, s33)
}

/// Inverse of [`trace_free_s`]: `[S22−S11, S11−S33, S12, S13, S23, S21, S31, S32]`.
pub fn s_components(s: &Matrix3<f64>) -> [f64; 8] {
    [
        s[(1, 1)] - s[(0, 0)],
        s[(0, 0)] - s[(2, 2)],
        s[(0, 1)],
        s[(0, 2)],
        s[(1, 2)],
        s[(1, 0)],
        s[(2, 0)],
        s[(2, 1)],
    ]
}

/// The antisymmetric shift matrix of `v` (see the module documentation).
pub fn shift_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, v.z, -v.y, -v.z, 0.0, v.x, v.y, -v.x, 0.0)
}

/// Predicted anisotropic displacement at `v = position − origin`.
pub fn calc_utls(tensors: &TlsTensors, v: &Vector3<f64>) -> Matrix3<f64> {
    let a = shift_matrix(v);
    let a_s = a * tensors.s;
    let u = tensors.t + a * tensors.l * a.transpose() + a_s + a_s.transpose();
    symmetrize(&u)
}

pub fn symmetrize(m: &Matrix3<f64>) -> Matrix3<f64> {
    (m + m.transpose()) * 0.5
}

/// Eigen-decomposition of a symmetric matrix with eigenvalues in ascending order.
///
/// The returned matrix holds the matching unit eigenvectors as columns.
pub fn sorted_symmetric_eigen(m: &Matrix3<f64>) -> ([f64; 3], Matrix3<f64>) {
    let eigen = SymmetricEigen::new(symmetrize(m));
    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| eigen.eigenvalues[i].total_cmp(&eigen.eigenvalues[j]));

    let values = order.map(|i| eigen.eigenvalues[i]);
    let vectors = Matrix3::from_columns(&order.map(|i| eigen.eigenvectors.column(i).into_owned()));
    (values, vectors)
}

pub fn min_eigenvalue(m: &Matrix3<f64>) -> f64 {
    sorted_symmetric_eigen(m).0[0]
}

pub fn max_eigenvalue(m: &Matrix3<f64>) -> f64 {
    sorted_symmetric_eigen(m).0[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tensors() -> TlsTensors {
        TlsTensors::new(
            symmetric(0.06, 0.05, 0.07, 0.01, 0.002, -0.003),
            symmetric(0.003, 0.002, 0.0025, 0.0005, 0.0001, -0.0002),
            trace_free_s(0.0003, -0.0004, 0.001, 0.0002, 0.0005, -0.0006, -0.0008, 0.0004),
        )
    }

    fn assert_matrix_close(a: &Matrix3<f64>, b: &Matrix3<f64>, tol: f64) {
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (a[(i, j)] - b[(i, j)]).abs() < tol,
                    "mismatch at ({i},{j}): {} vs {}",
                    a[(i, j)],
                    b[(i, j)]
                );
            }
        }
    }

    #[test]
    fn trace_free_s_has_exactly_zero_trace() {
        let s = trace_free_s(0.37, -1.21, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6);
        assert!(s.trace().abs() < 1e-15);
        let s = trace_free_s(1e-3, 7e-4, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(s.trace().abs() < 1e-18);
    }

    #[test]
    fn s_components_invert_trace_free_s() {
        let comps = [0.37, -1.21, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let s = trace_free_s(
            comps[0], comps[1], comps[2], comps[3], comps[4], comps[5], comps[6], comps[7],
        );
        let back = s_components(&s);
        for (a, b) in comps.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-14);
        }
    }

    #[test]
    fn calc_utls_matches_component_formula() {
        let tls = sample_tensors();
        let v = Vector3::new(1.3, -2.1, 0.7);
        let (x, y, z) = (v.x, v.y, v.z);
        let (t, l, s) = (tls.t, tls.l, tls.s);

        let u11 = t[(0, 0)] + l[(1, 1)] * z * z + l[(2, 2)] * y * y
            - 2.0 * l[(1, 2)] * y * z
            + 2.0 * s[(1, 0)] * z
            - 2.0 * s[(2, 0)] * y;
        let u23 = t[(1, 2)] - l[(0, 0)] * y * z - l[(1, 2)] * x * x
            + l[(0, 2)] * x * y
            + l[(0, 1)] * x * z
            + x * (s[(2, 2)] - s[(1, 1)])
            - z * s[(0, 2)]
            + y * s[(0, 1)];

        let u = calc_utls(&tls, &v);
        assert!((u[(0, 0)] - u11).abs() < 1e-14);
        assert!((u[(1, 2)] - u23).abs() < 1e-14);
        assert_eq!(u, u.transpose());
    }

    #[test]
    fn shifted_origin_predicts_identical_displacements() {
        let tls = sample_tensors();
        let rho = Vector3::new(3.2, -7.5, 11.0);
        let shifted = tls.shift_origin(&rho);

        assert!(shifted.s.trace().abs() < 1e-14);
        for v in [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(4.0, -3.0, 2.5),
            Vector3::new(-12.0, 8.0, 1.0),
        ] {
            let direct = calc_utls(&tls, &v);
            let via_shift = calc_utls(&shifted, &(v - rho));
            assert_matrix_close(&direct, &via_shift, 1e-12);
        }
    }

    #[test]
    fn eigenvalues_are_sorted_ascending_with_matching_columns() {
        let m = symmetric(3.0, 1.0, 2.0, 0.2, 0.0, 0.1);
        let (values, vectors) = sorted_symmetric_eigen(&m);
        assert!(values[0] <= values[1] && values[1] <= values[2]);
        for k in 0..3 {
            let v = vectors.column(k);
            let residual = m * v - v * values[k];
            assert!(residual.norm() < 1e-12);
        }
    }

    #[test]
    fn rotation_with_left_handed_frame_negates_s() {
        let tls = sample_tensors();
        let mirror = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0);
        let rotated = tls.rotate_into(&mirror);
        assert_matrix_close(&rotated.s, &(-(mirror * tls.s * mirror)), 1e-15);
        assert_matrix_close(&rotated.t, &(mirror * tls.t * mirror), 1e-15);
    }
}
