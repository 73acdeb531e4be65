//! Center-of-reaction decomposition of a TLS model.
//!
//! The libration tensor is diagonalized with eigenvalues in ascending order, so
//! axis 1 is always the smallest libration. Tensors carrying a hat (`^`) are
//! expressed in that principal-axis frame; primed tensors are referred to the
//! center of reaction.

use super::tensors::{TlsTensors, sorted_symmetric_eigen, symmetrize};
use crate::core::utils::units::DEG2RAD2;
use nalgebra::{Matrix3, Point3, Vector3};

/// Libration eigenvalues (rad²) below this magnitude are treated as zero in divisions.
pub const SMALL_LIBRATION: f64 = 0.002 * DEG2RAD2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LibrationAxis {
    /// Eigenvalue of L in rad².
    pub value: f64,
    /// Unit eigenvector in the original frame.
    pub vector: Vector3<f64>,
}

/// A non-intersecting screw axis through the libration principal axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrewAxis {
    /// Displacement of the axis from the center of reaction, original frame.
    pub rho: Vector3<f64>,
    /// Translation per radian of libration, in Å/rad. Zero for a negligible libration.
    pub pitch: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CenterOfReaction {
    pub l_axes: [LibrationAxis; 3],
    /// Eigenvectors of L as columns, in eigenvalue order. May be left-handed.
    pub rotation: Matrix3<f64>,
    pub origin: Point3<f64>,
    /// Origin shift in the principal-axis frame.
    pub rho_hat: Vector3<f64>,
    /// Origin shift in the original frame.
    pub rho: Vector3<f64>,
    pub cor: Point3<f64>,
    /// Tensors about the calculation origin, principal-axis frame.
    pub hat: TlsTensors,
    /// Tensors about the center of reaction, original frame.
    pub prime: TlsTensors,
    /// Tensors about the center of reaction, principal-axis frame.
    pub prime_hat: TlsTensors,
    pub screw_axes: [ScrewAxis; 3],
    /// Translation remaining after the screw contributions are removed, original frame.
    pub t_reduced: Matrix3<f64>,
}

/// Divides only by a libration (or libration sum) of at least [`SMALL_LIBRATION`];
/// smaller denominators, negative ones included, give zero.
#[inline]
fn guarded_div(numerator: f64, denominator: f64) -> f64 {
    if denominator >= SMALL_LIBRATION {
        numerator / denominator
    } else {
        0.0
    }
}

/// Resolves the center of reaction of `tensors` given about `origin`.
pub fn calc_cor(tensors: &TlsTensors, origin: &Point3<f64>) -> CenterOfReaction {
    let (values, rotation) = sorted_symmetric_eigen(&tensors.l);

    // S is negated here when the eigenvector matrix is left-handed.
    let hat = tensors.rotate_into(&rotation);
    let c_l = Vector3::new(hat.l[(0, 0)], hat.l[(1, 1)], hat.l[(2, 2)]);
    let c_s = hat.s;

    let rho_hat = Vector3::new(
        guarded_div(c_s[(1, 2)] - c_s[(2, 1)], c_l[1] + c_l[2]),
        guarded_div(c_s[(2, 0)] - c_s[(0, 2)], c_l[0] + c_l[2]),
        guarded_div(c_s[(0, 1)] - c_s[(1, 0)], c_l[0] + c_l[1]),
    );
    let rho = rotation * rho_hat;
    let cor = origin + rho;

    let prime = tensors.shift_origin(&rho);
    let mut prime_hat = hat.shift_origin(&rho_hat);
    prime_hat.l = Matrix3::from_diagonal(&c_l);

    let sp = prime_hat.s;
    let axis_rho_hat = [
        Vector3::new(0.0, -guarded_div(sp[(0, 2)], c_l[0]), guarded_div(sp[(0, 1)], c_l[0])),
        Vector3::new(guarded_div(sp[(1, 2)], c_l[1]), 0.0, -guarded_div(sp[(1, 0)], c_l[1])),
        Vector3::new(-guarded_div(sp[(2, 1)], c_l[2]), guarded_div(sp[(2, 0)], c_l[2]), 0.0),
    ];
    let screw_axes: [ScrewAxis; 3] = std::array::from_fn(|i| ScrewAxis {
        rho: rotation * axis_rho_hat[i],
        pitch: guarded_div(sp[(i, i)], c_l[i]),
    });

    let mut t_red_hat = prime_hat.t;
    for i in 0..3 {
        for j in i..3 {
            let correction: f64 = (0..3)
                .filter(|&k| k != i && k != j)
                .map(|k| guarded_div(sp[(k, i)] * sp[(k, j)], c_l[k]))
                .sum();
            t_red_hat[(i, j)] -= correction;
            if i != j {
                t_red_hat[(j, i)] -= correction;
            }
        }
    }
    let t_reduced = symmetrize(&(rotation * t_red_hat * rotation.transpose()));

    let l_axes: [LibrationAxis; 3] = std::array::from_fn(|i| LibrationAxis {
        value: values[i],
        vector: rotation.column(i).into_owned(),
    });

    CenterOfReaction {
        l_axes,
        rotation,
        origin: *origin,
        rho_hat,
        rho,
        cor,
        hat,
        prime,
        prime_hat,
        screw_axes,
        t_reduced,
    }
}
