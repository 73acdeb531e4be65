use super::ids::{AtomId, ChainId};
use phf::{Set, phf_set};
use std::collections::HashMap;

static AMINO_ACID_NAMES: Set<&'static str> = phf_set! {
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE",
    "LEU", "LYS", "MET", "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL",
    "MSE", "SEC", "PYL", "HSD", "HSE", "HSP", "HID", "HIE", "HIP", "CYX",
};

static MAIN_CHAIN_ATOM_NAMES: Set<&'static str> = phf_set! { "N", "CA", "C", "O" };

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub fragment_id: String,                // Sequence number plus insertion code (e.g. "42", "42A")
    pub name: String,                       // Name of the residue (e.g., "ALA", "HOH")
    pub chain_id: ChainId,                  // ID of the parent chain
    pub(crate) atoms: Vec<AtomId>,          // Atoms in file order
    atom_name_map: HashMap<String, AtomId>, // Map from atom name to its stable ID
}

impl Residue {
    pub(crate) fn new(fragment_id: &str, name: &str, chain_id: ChainId) -> Self {
        Self {
            fragment_id: fragment_id.to_string(),
            name: name.to_string(),
            chain_id,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.push(atom_id);
        self.atom_name_map
            .entry(atom_name.to_string())
            .or_insert(atom_id);
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn get_atom_id_by_name(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map.get(name).copied()
    }

    pub fn is_amino_acid(&self) -> bool {
        AMINO_ACID_NAMES.contains(self.name.to_ascii_uppercase().as_str())
    }
}

/// Returns `true` for the backbone atoms N, CA, C and O.
pub fn is_main_chain_atom(name: &str) -> bool {
    MAIN_CHAIN_ATOM_NAMES.contains(name)
}
