use super::cor::{CenterOfReaction, calc_cor};
use super::fit::{FitError, least_squares_fit};
use super::metrics::{MeanSigma, calc_anisotropy, calc_dp2, calc_r_factor, calc_suij};
use super::tensors::{
    TlsTensors, calc_utls, max_eigenvalue, min_eigenvalue, sorted_symmetric_eigen, symmetric,
    trace_free_s,
};
use crate::core::models::atom::Atom;
use crate::core::utils::geometry::centroid;
use crate::core::utils::units::{DEG2RAD, DEG2RAD2, RAD2DEG2, u_to_b};
use nalgebra::{Matrix3, Point3, Vector3};

/// Eigenvalues of T, L and every predicted U must exceed this for a valid model.
pub const ADP_EPSILON: f64 = 1e-10;

/// A trace of T or L below this marks the group as carrying no model.
const NULL_TRACE_TOLERANCE: f64 = 1e-8;

/// A rigid group of atoms and the TLS tensors describing its motion about `origin`.
///
/// The group borrows its atoms; fitting and origin changes mutate only the
/// group's own origin and tensors.
#[derive(Debug, Clone)]
pub struct TlsGroup<'a> {
    pub name: String,
    atoms: Vec<&'a Atom>,
    pub origin: Point3<f64>,
    pub tensors: TlsTensors,
}

/// Summary of a group's experimental ADPs and, for a valid model, the fit quality.
#[derive(Debug, Clone, PartialEq)]
pub struct TlsStatistics {
    pub num_atoms: usize,
    pub exp_mean_temp_factor: Option<f64>,
    pub exp_mean_anisotropy: Option<f64>,
    /// Eigenvalues of T in Å², ascending.
    pub t_eigenvalues: [f64; 3],
    /// Eigenvalues of L in deg², ascending.
    pub l_eigenvalues_deg2: [f64; 3],
    pub valid_model: bool,
    pub fit: Option<FitQuality>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitQuality {
    pub r_factor: Option<f64>,
    pub suij: Option<MeanSigma>,
    pub dp2: Option<MeanSigma>,
    pub sum_dp2: Option<f64>,
    /// Mean over atoms of the largest predicted principal B (8π²·λmax), Å².
    pub tls_mean_max_temp_factor: Option<f64>,
    pub tls_mean_temp_factor: Option<f64>,
    pub tls_mean_anisotropy: Option<f64>,
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    MeanSigma::from_values(values).map(|ms| ms.mean)
}

impl<'a> TlsGroup<'a> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_atoms(name, Vec::new())
    }

    pub fn from_atoms(name: impl Into<String>, atoms: Vec<&'a Atom>) -> Self {
        Self {
            name: name.into(),
            atoms,
            origin: Point3::origin(),
            tensors: TlsTensors::default(),
        }
    }

    pub fn append(&mut self, atom: &'a Atom) {
        self.atoms.push(atom);
    }

    pub fn atoms(&self) -> &[&'a Atom] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn set_origin(&mut self, x: f64, y: f64, z: f64) {
        self.origin = Point3::new(x, y, z);
    }

    /// Sets T (Å²) from its components `11, 22, 33, 12, 13, 23`.
    pub fn set_t(&mut self, t11: f64, t22: f64, t33: f64, t12: f64, t13: f64, t23: f64) {
        self.tensors.t = symmetric(t11, t22, t33, t12, t13, t23);
    }

    /// Sets L (rad²) from its components `11, 22, 33, 12, 13, 23`.
    pub fn set_l(&mut self, l11: f64, l22: f64, l33: f64, l12: f64, l13: f64, l23: f64) {
        self.tensors.l = symmetric(l11, l22, l33, l12, l13, l23);
    }

    /// Sets L from components given in deg².
    pub fn set_l_deg2(&mut self, l11: f64, l22: f64, l33: f64, l12: f64, l13: f64, l23: f64) {
        self.set_l(
            l11 * DEG2RAD2,
            l22 * DEG2RAD2,
            l33 * DEG2RAD2,
            l12 * DEG2RAD2,
            l13 * DEG2RAD2,
            l23 * DEG2RAD2,
        );
    }

    /// Sets a trace-free S (rad·Å) from `S22−S11, S11−S33, S12, S13, S23, S21, S31, S32`.
    #[allow(clippy::too_many_arguments)]
    pub fn set_s(
        &mut self,
        s2211: f64,
        s1133: f64,
        s12: f64,
        s13: f64,
        s23: f64,
        s21: f64,
        s31: f64,
        s32: f64,
    ) {
        self.tensors.s = trace_free_s(s2211, s1133, s12, s13, s23, s21, s31, s32);
    }

    /// Same as [`TlsGroup::set_s`] with components in deg·Å.
    #[allow(clippy::too_many_arguments)]
    pub fn set_s_deg(
        &mut self,
        s2211: f64,
        s1133: f64,
        s12: f64,
        s13: f64,
        s23: f64,
        s21: f64,
        s31: f64,
        s32: f64,
    ) {
        self.set_s(
            s2211 * DEG2RAD,
            s1133 * DEG2RAD,
            s12 * DEG2RAD,
            s13 * DEG2RAD,
            s23 * DEG2RAD,
            s21 * DEG2RAD,
            s31 * DEG2RAD,
            s32 * DEG2RAD,
        );
    }

    pub fn is_null(&self) -> bool {
        self.tensors.t.trace().abs() < NULL_TRACE_TOLERANCE
            || self.tensors.l.trace().abs() < NULL_TRACE_TOLERANCE
    }

    pub fn centroid(&self) -> Option<Point3<f64>> {
        centroid(self.atoms.iter().map(|atom| &atom.position))
    }

    /// Replaces T, L and S with a least-squares fit about the current origin.
    pub fn fit(&mut self) -> Result<(), FitError> {
        self.tensors = least_squares_fit(&self.atoms, &self.origin)?;
        Ok(())
    }

    /// Moves the origin to `new_origin`, replacing the tensors with their equivalents there.
    pub fn shift_origin_to(&mut self, new_origin: Point3<f64>) {
        let rho: Vector3<f64> = new_origin - self.origin;
        self.tensors = self.tensors.shift_origin(&rho);
        self.origin = new_origin;
    }

    pub fn calc_utls(&self, atom: &Atom) -> Matrix3<f64> {
        calc_utls(&self.tensors, &(atom.position - self.origin))
    }

    /// Each member atom paired with its model-predicted displacement tensor.
    pub fn iter_atm_utls(&self) -> impl Iterator<Item = (&'a Atom, Matrix3<f64>)> + '_ {
        self.atoms.iter().map(|&atom| (atom, self.calc_utls(atom)))
    }

    pub fn predicted_adps(&self) -> Vec<Matrix3<f64>> {
        self.iter_atm_utls().map(|(_, u)| u).collect()
    }

    /// A model is valid only if T, L and every predicted U are positive definite.
    pub fn check_valid_model(&self) -> bool {
        if min_eigenvalue(&self.tensors.l) <= ADP_EPSILON {
            return false;
        }
        if min_eigenvalue(&self.tensors.t) <= ADP_EPSILON {
            return false;
        }
        self.iter_atm_utls()
            .all(|(_, u)| min_eigenvalue(&u) > ADP_EPSILON)
    }

    pub fn calc_cor(&self) -> CenterOfReaction {
        calc_cor(&self.tensors, &self.origin)
    }

    /// Moves the origin to the center of reaction and stores T', L, S' there.
    pub fn shift_cor(&mut self) -> CenterOfReaction {
        let cor = self.calc_cor();
        self.origin = cor.cor;
        self.tensors = cor.prime;
        cor
    }

    /// Refits about `origin + shift` and checks that predictions agree within `tolerance`.
    pub fn verify_origin_independence(
        &self,
        shift: &Vector3<f64>,
        tolerance: f64,
    ) -> Result<bool, FitError> {
        let mut shifted = self.clone();
        shifted.origin += *shift;
        shifted.fit()?;
        Ok(self
            .iter_atm_utls()
            .zip(shifted.iter_atm_utls())
            .all(|((_, a), (_, b))| (a - b).abs().max() <= tolerance))
    }

    pub fn calc_r(&self) -> Option<f64> {
        let pairs: Vec<(Matrix3<f64>, Matrix3<f64>)> = self
            .iter_atm_utls()
            .map(|(atom, utls)| (atom.adp(), utls))
            .collect();
        calc_r_factor(pairs.iter().map(|(o, p)| (o, p)))
    }

    fn dp2_values(&self) -> Vec<f64> {
        self.iter_atm_utls()
            .filter_map(|(atom, utls)| calc_dp2(&atom.adp(), &utls))
            .collect()
    }

    pub fn calc_mean_dp2(&self) -> Option<MeanSigma> {
        MeanSigma::from_values(self.dp2_values())
    }

    pub fn calc_sum_dp2(&self) -> Option<f64> {
        let values = self.dp2_values();
        (!values.is_empty()).then(|| values.iter().sum())
    }

    pub fn calc_mean_suij(&self) -> Option<MeanSigma> {
        MeanSigma::from_values(
            self.iter_atm_utls()
                .filter_map(|(atom, utls)| calc_suij(&atom.adp(), &utls)),
        )
    }

    /// Collects the experimental and model statistics of this group.
    pub fn calc_tls_info(&self) -> TlsStatistics {
        let (t_eigenvalues, _) = sorted_symmetric_eigen(&self.tensors.t);
        let (l_eigenvalues, _) = sorted_symmetric_eigen(&self.tensors.l);
        let valid_model = self.check_valid_model();

        let fit = valid_model.then(|| {
            let predicted = self.predicted_adps();
            FitQuality {
                r_factor: self.calc_r(),
                suij: self.calc_mean_suij(),
                dp2: self.calc_mean_dp2(),
                sum_dp2: self.calc_sum_dp2(),
                tls_mean_max_temp_factor: mean(predicted.iter().map(|u| u_to_b(max_eigenvalue(u)))),
                tls_mean_temp_factor: mean(predicted.iter().map(|u| u_to_b(u.trace() / 3.0))),
                tls_mean_anisotropy: mean(predicted.iter().filter_map(calc_anisotropy)),
            }
        });

        TlsStatistics {
            num_atoms: self.atoms.len(),
            exp_mean_temp_factor: mean(self.atoms.iter().map(|atom| atom.temp_factor)),
            exp_mean_anisotropy: mean(self.atoms.iter().filter_map(|atom| calc_anisotropy(&atom.adp()))),
            t_eigenvalues,
            l_eigenvalues_deg2: l_eigenvalues.map(|v| v * RAD2DEG2),
            valid_model,
            fit,
        }
    }
}
