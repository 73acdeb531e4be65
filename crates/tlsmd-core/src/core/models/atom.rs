use super::ids::ResidueId;
use crate::core::utils::units::b_to_u;
use nalgebra::{Matrix3, Point3};

/// Represents an atom of a crystallographic model together with its displacement parameters.
///
/// The anisotropic tensor `u` is optional; when it is absent the isotropic
/// temperature factor stands in for it (see [`Atom::adp`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The name of the atom (e.g., "CA", "N", "O").
    pub name: String,
    /// The serial number from the source file.
    pub serial: usize,
    /// Element symbol, upper case (e.g., "C", "SE").
    pub element: String,
    /// Alternate location indicator, if any.
    pub alt_loc: Option<char>,
    /// The ID of the parent residue this atom belongs to.
    pub residue_id: ResidueId,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    /// Fractional occupancy in `[0, 1]`.
    pub occupancy: f64,
    /// Isotropic temperature factor B in Å².
    pub temp_factor: f64,
    /// Anisotropic displacement tensor U in Å², if one was supplied.
    pub u: Option<Matrix3<f64>>,
}

impl Atom {
    /// Creates a fully occupied atom with zero displacement and an element guessed from its name.
    pub fn new(name: &str, residue_id: ResidueId, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            serial: 0,
            element: guess_element(name),
            alt_loc: None,
            residue_id,
            position,
            occupancy: 1.0,
            temp_factor: 0.0,
            u: None,
        }
    }

    /// The displacement tensor used for fitting and comparison.
    ///
    /// Falls back to the isotropic equivalent `B/(8π²)·I` when no anisotropic tensor is present.
    pub fn adp(&self) -> Matrix3<f64> {
        self.u
            .unwrap_or_else(|| Matrix3::identity() * b_to_u(self.temp_factor))
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self.element.as_str(), "H" | "D")
    }
}

/// Derives an element symbol from an atom name when the source file leaves it blank.
pub fn guess_element(name: &str) -> String {
    let letters: String = name
        .trim()
        .chars()
        .skip_while(|c| c.is_ascii_digit())
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    match letters.chars().next() {
        Some(first) => first.to_ascii_uppercase().to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn dummy_residue_id() -> ResidueId {
        ResidueId::from(KeyData::from_ffi(1))
    }

    #[test]
    fn adp_falls_back_to_isotropic_equivalent() {
        let mut atom = Atom::new("CA", dummy_residue_id(), Point3::origin());
        atom.temp_factor = 8.0 * std::f64::consts::PI * std::f64::consts::PI * 0.25;

        let adp = atom.adp();
        assert!((adp[(0, 0)] - 0.25).abs() < 1e-12);
        assert!((adp[(1, 1)] - 0.25).abs() < 1e-12);
        assert_eq!(adp[(0, 1)], 0.0);
    }

    #[test]
    fn adp_prefers_anisotropic_tensor() {
        let mut atom = Atom::new("CA", dummy_residue_id(), Point3::origin());
        atom.temp_factor = 50.0;
        let u = Matrix3::new(0.1, 0.01, 0.0, 0.01, 0.2, 0.0, 0.0, 0.0, 0.3);
        atom.u = Some(u);
        assert_eq!(atom.adp(), u);
    }

    #[test]
    fn element_is_guessed_from_name() {
        assert_eq!(guess_element("CA"), "C");
        assert_eq!(guess_element("1HB2"), "H");
        assert_eq!(guess_element(" OG1"), "O");
        assert!(Atom::new("HA", dummy_residue_id(), Point3::origin()).is_hydrogen());
    }
}
