use super::tensors::{TlsTensors, symmetric, symmetric_components, trace_free_s};
use crate::core::models::atom::Atom;
use nalgebra::{DMatrix, DVector, Point3};
use thiserror::Error;
use tracing::warn;

/// Number of free TLS parameters: 6 (T) + 6 (L) + 8 (trace-free S).
pub const NUM_PARAMETERS: usize = 20;

/// Minimum number of atoms for a well-determined fit.
pub const MIN_ATOMS: usize = 20;

/// Largest tolerated |trace(S)| of a fitted screw tensor.
const TRACE_TOLERANCE: f64 = 1e-8;

/// Singular values below this fraction of the largest are treated as zero.
const RELATIVE_SINGULAR_CUTOFF: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("At least {required} atoms are required for a TLS fit, got {found}")]
    TooFewAtoms { found: usize, required: usize },
    #[error("Least-squares solver failed: {0}")]
    Solver(String),
    #[error("Fitted S tensor has trace {trace:e}, expected zero")]
    TraceConstraint { trace: f64 },
}

// Column layout of the design matrix.
const T11: usize = 0;
const T22: usize = 1;
const T33: usize = 2;
const T12: usize = 3;
const T13: usize = 4;
const T23: usize = 5;
const L11: usize = 6;
const L22: usize = 7;
const L33: usize = 8;
const L12: usize = 9;
const L13: usize = 10;
const L23: usize = 11;
const S2211: usize = 12;
const S1133: usize = 13;
const S12: usize = 14;
const S13: usize = 15;
const S23: usize = 16;
const S21: usize = 17;
const S31: usize = 18;
const S32: usize = 19;

/// Writes the six equations of one atom into rows `row..row + 6` of the design matrix.
fn set_atom_rows(a: &mut DMatrix<f64>, row: usize, x: f64, y: f64, z: f64) {
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);

    // U11
    a[(row, T11)] = 1.0;
    a[(row, L22)] = zz;
    a[(row, L33)] = yy;
    a[(row, L23)] = -2.0 * yz;
    a[(row, S21)] = 2.0 * z;
    a[(row, S31)] = -2.0 * y;

    // U22
    let r = row + 1;
    a[(r, T22)] = 1.0;
    a[(r, L11)] = zz;
    a[(r, L33)] = xx;
    a[(r, L13)] = -2.0 * xz;
    a[(r, S12)] = -2.0 * z;
    a[(r, S32)] = 2.0 * x;

    // U33
    let r = row + 2;
    a[(r, T33)] = 1.0;
    a[(r, L11)] = yy;
    a[(r, L22)] = xx;
    a[(r, L12)] = -2.0 * xy;
    a[(r, S13)] = 2.0 * y;
    a[(r, S23)] = -2.0 * x;

    // U12
    let r = row + 3;
    a[(r, T12)] = 1.0;
    a[(r, L33)] = -xy;
    a[(r, L23)] = xz;
    a[(r, L13)] = yz;
    a[(r, L12)] = -zz;
    a[(r, S2211)] = z;
    a[(r, S32)] = -y;
    a[(r, S31)] = x;

    // U13
    let r = row + 4;
    a[(r, T13)] = 1.0;
    a[(r, L22)] = -xz;
    a[(r, L23)] = xy;
    a[(r, L13)] = -yy;
    a[(r, L12)] = yz;
    a[(r, S1133)] = y;
    a[(r, S23)] = z;
    a[(r, S21)] = -x;

    // U23
    let r = row + 5;
    a[(r, T23)] = 1.0;
    a[(r, L11)] = -yz;
    a[(r, L23)] = -xx;
    a[(r, L13)] = xy;
    a[(r, L12)] = xz;
    a[(r, S2211)] = -x;
    a[(r, S1133)] = -x;
    a[(r, S13)] = -z;
    a[(r, S12)] = y;
}

/// Fits T, L and S about `origin` to the displacement tensors of `atoms`.
///
/// Each atom contributes six equations, one per independent component of its
/// ADP (see [`Atom::adp`]). The 6N×20 system is solved in the least-squares
/// sense through an SVD; a rank-deficient system yields the minimum-norm
/// solution and a warning.
pub fn least_squares_fit(atoms: &[&Atom], origin: &Point3<f64>) -> Result<TlsTensors, FitError> {
    if atoms.len() < MIN_ATOMS {
        return Err(FitError::TooFewAtoms {
            found: atoms.len(),
            required: MIN_ATOMS,
        });
    }

    let rows = 6 * atoms.len();
    let mut a = DMatrix::<f64>::zeros(rows, NUM_PARAMETERS);
    let mut b = DVector::<f64>::zeros(rows);

    for (i, atom) in atoms.iter().enumerate() {
        let v = atom.position - origin;
        let row = 6 * i;
        set_atom_rows(&mut a, row, v.x, v.y, v.z);
        for (k, value) in symmetric_components(&atom.adp()).into_iter().enumerate() {
            b[row + k] = value;
        }
    }

    let svd = a.svd(true, true);
    let max_singular = svd.singular_values.max();
    if !max_singular.is_finite() || max_singular <= 0.0 {
        return Err(FitError::Solver(
            "design matrix has no non-zero singular values".to_string(),
        ));
    }
    let cutoff = max_singular * RELATIVE_SINGULAR_CUTOFF;
    let rank = svd.rank(cutoff);
    if rank < NUM_PARAMETERS {
        warn!(
            rank,
            atoms = atoms.len(),
            "TLS design matrix is rank deficient; using minimum-norm solution"
        );
    }
    let x = svd
        .solve(&b, cutoff)
        .map_err(|e| FitError::Solver(e.to_string()))?;

    let t = symmetric(x[T11], x[T22], x[T33], x[T12], x[T13], x[T23]);
    let l = symmetric(x[L11], x[L22], x[L33], x[L12], x[L13], x[L23]);
    let s = trace_free_s(
        x[S2211], x[S1133], x[S12], x[S13], x[S23], x[S21], x[S31], x[S32],
    );

    let trace = s.trace();
    if !trace.is_finite() || trace.abs() > TRACE_TOLERANCE {
        return Err(FitError::TraceConstraint { trace });
    }

    Ok(TlsTensors::new(t, l, s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tls::tensors::calc_utls;
    use slotmap::KeyData;

    fn lattice_atoms(n: usize) -> Vec<Atom> {
        let rid = crate::core::models::ids::ResidueId::from(KeyData::from_ffi(1));
        (0..n)
            .map(|i| {
                let pos = Point3::new(
                    2.0 * (i % 3) as f64,
                    2.0 * ((i / 3) % 2) as f64,
                    2.0 * (i / 6) as f64,
                );
                Atom::new("C", rid, pos)
            })
            .collect()
    }

    #[test]
    fn too_few_atoms_is_reported() {
        let atoms = lattice_atoms(19);
        let refs: Vec<&Atom> = atoms.iter().collect();
        assert_eq!(
            least_squares_fit(&refs, &Point3::origin()),
            Err(FitError::TooFewAtoms {
                found: 19,
                required: 20
            })
        );
    }

    #[test]
    fn recovers_tensors_with_nonzero_screw() {
        let mut atoms = lattice_atoms(30);
        let origin = Point3::new(2.0, 1.0, 4.0);
        let truth = TlsTensors::new(
            symmetric(0.03, 0.025, 0.02, 0.004, -0.002, 0.001),
            symmetric(0.01, 0.02, 0.015, 0.002, 0.001, -0.003),
            trace_free_s(0.002, -0.001, 0.0015, -0.0005, 0.0007, 0.0003, -0.0012, 0.0009),
        );
        for atom in &mut atoms {
            atom.u = Some(calc_utls(&truth, &(atom.position - origin)));
        }
        let refs: Vec<&Atom> = atoms.iter().collect();

        let fitted = least_squares_fit(&refs, &origin).unwrap();
        assert!((fitted.t - truth.t).abs().max() < 1e-8);
        assert!((fitted.l - truth.l).abs().max() < 1e-8);
        assert!((fitted.s - truth.s).abs().max() < 1e-8);
        assert!(fitted.s.trace().abs() < 1e-15);
    }
}
