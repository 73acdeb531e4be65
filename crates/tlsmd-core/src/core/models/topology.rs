use super::ids::AtomId;
use phf::{Map, phf_map};

/// Single-bond covalent radii in Angstroms, keyed by element symbol.
static COVALENT_RADII: Map<&'static str, f64> = phf_map! {
    "H" => 0.31,
    "D" => 0.31,
    "C" => 0.76,
    "N" => 0.71,
    "O" => 0.66,
    "S" => 1.05,
    "P" => 1.07,
    "SE" => 1.20,
    "F" => 0.57,
    "CL" => 1.02,
    "BR" => 1.20,
    "I" => 1.39,
    "FE" => 1.32,
    "ZN" => 1.22,
    "MG" => 1.41,
    "CA" => 1.76,
    "NA" => 1.66,
    "K" => 2.03,
    "MN" => 1.39,
    "CU" => 1.32,
};

const FALLBACK_RADIUS: f64 = 0.77;

pub fn covalent_radius(element: &str) -> f64 {
    COVALENT_RADII
        .get(element)
        .copied()
        .unwrap_or(FALLBACK_RADIUS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1_id: AtomId,
    pub atom2_id: AtomId,
}

impl Bond {
    pub fn new(atom1_id: AtomId, atom2_id: AtomId) -> Self {
        Self { atom1_id, atom2_id }
    }

    pub fn contains(&self, atom_id: AtomId) -> bool {
        self.atom1_id == atom_id || self.atom2_id == atom_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_radii() {
        assert_eq!(covalent_radius("C"), 0.76);
        assert_eq!(covalent_radius("SE"), 1.20);
        assert_eq!(covalent_radius("XX"), FALLBACK_RADIUS);
    }
}
