use super::atom::Atom;
use super::chain::Chain;
use super::ids::{AtomId, ChainId, ResidueId};
use super::residue::Residue;
use super::topology::{Bond, covalent_radius};
use itertools::Itertools;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("Chain '{0}' not found")]
    ChainNotFound(char),
    #[error("Fragment '{fragment_id}' not found in chain '{chain_id}'")]
    FragmentNotFound { chain_id: char, fragment_id: String },
    #[error("Fragment '{first}' follows '{last}' in chain '{chain_id}'")]
    InvertedRange {
        chain_id: char,
        first: String,
        last: String,
    },
}

/// A crystallographic model: chains of residues of atoms, plus covalent bonds.
///
/// This is the atom source for every TLS calculation. The TLS core only reads
/// from it; the one exception is the scoped overlay in
/// [`crate::engine::overlay`], which restores whatever it changes.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    atoms: SlotMap<AtomId, Atom>,
    residues: SlotMap<ResidueId, Residue>,
    chains: SlotMap<ChainId, Chain>,
    chain_order: Vec<ChainId>,
    bonds: Vec<Bond>,
    residue_id_map: HashMap<(ChainId, String), ResidueId>,
    chain_id_map: HashMap<char, ChainId>,
    bond_adjacency: SecondaryMap<AtomId, Vec<AtomId>>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id)
    }

    /// Chains in the order they were first added.
    pub fn chains_iter(&self) -> impl Iterator<Item = (ChainId, &Chain)> {
        self.chain_order
            .iter()
            .filter_map(|&id| self.chains.get(id).map(|chain| (id, chain)))
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn find_chain_by_id(&self, id: char) -> Option<ChainId> {
        self.chain_id_map.get(&id).copied()
    }

    pub fn find_residue_by_fragment(&self, chain_id: ChainId, fragment_id: &str) -> Option<ResidueId> {
        self.residue_id_map
            .get(&(chain_id, fragment_id.to_string()))
            .copied()
    }

    pub fn add_chain(&mut self, id: char) -> ChainId {
        if let Some(&existing) = self.chain_id_map.get(&id) {
            return existing;
        }
        let chain_id = self.chains.insert(Chain::new(id));
        self.chain_id_map.insert(id, chain_id);
        self.chain_order.push(chain_id);
        chain_id
    }

    pub fn add_residue(&mut self, chain_id: ChainId, fragment_id: &str, name: &str) -> Option<ResidueId> {
        let chain = self.chains.get_mut(chain_id)?;
        let key = (chain_id, fragment_id.to_string());

        let residue_id = *self.residue_id_map.entry(key).or_insert_with(|| {
            let residue = Residue::new(fragment_id, name, chain_id);
            self.residues.insert(residue)
        });

        if !chain.residues.contains(&residue_id) {
            chain.residues.push(residue_id);
        }

        Some(residue_id)
    }

    pub fn add_atom_to_residue(&mut self, residue_id: ResidueId, atom: Atom) -> Option<AtomId> {
        if !self.residues.contains_key(residue_id) {
            return None;
        }
        let name = atom.name.clone();
        let atom_id = self.atoms.insert(atom);
        self.bond_adjacency.insert(atom_id, Vec::new());
        self.residues.get_mut(residue_id)?.add_atom(&name, atom_id);
        Some(atom_id)
    }

    pub fn add_bond(&mut self, atom1_id: AtomId, atom2_id: AtomId) -> Option<()> {
        if atom1_id == atom2_id
            || !self.atoms.contains_key(atom1_id)
            || !self.atoms.contains_key(atom2_id)
        {
            return None;
        }
        if let Some(neighbors) = self.bond_adjacency.get(atom1_id) {
            if neighbors.contains(&atom2_id) {
                return Some(());
            }
        }
        self.bonds.push(Bond::new(atom1_id, atom2_id));
        self.bond_adjacency[atom1_id].push(atom2_id);
        self.bond_adjacency[atom2_id].push(atom1_id);
        Some(())
    }

    pub fn get_bonded_neighbors(&self, atom_id: AtomId) -> Option<&[AtomId]> {
        self.bond_adjacency.get(atom_id).map(|v| v.as_slice())
    }

    pub fn bond_count(&self, atom_id: AtomId) -> usize {
        self.get_bonded_neighbors(atom_id).map_or(0, <[AtomId]>::len)
    }

    /// Resolves the inclusive fragment range `frag_id1..=frag_id2` of a chain to its atoms.
    pub fn resolve_range(
        &self,
        chain_id: char,
        frag_id1: &str,
        frag_id2: &str,
    ) -> Result<Vec<AtomId>, StructureError> {
        let cid = self
            .find_chain_by_id(chain_id)
            .ok_or(StructureError::ChainNotFound(chain_id))?;
        let chain = &self.chains[cid];

        let position_of = |frag: &str| -> Result<usize, StructureError> {
            let rid = self.find_residue_by_fragment(cid, frag).ok_or_else(|| {
                StructureError::FragmentNotFound {
                    chain_id,
                    fragment_id: frag.to_string(),
                }
            })?;
            chain
                .residues
                .iter()
                .position(|&r| r == rid)
                .ok_or_else(|| StructureError::FragmentNotFound {
                    chain_id,
                    fragment_id: frag.to_string(),
                })
        };

        let first = position_of(frag_id1)?;
        let last = position_of(frag_id2)?;
        if first > last {
            return Err(StructureError::InvertedRange {
                chain_id,
                first: frag_id1.to_string(),
                last: frag_id2.to_string(),
            });
        }

        Ok(chain.residues[first..=last]
            .iter()
            .filter_map(|&rid| self.residues.get(rid))
            .flat_map(|residue| residue.atoms.iter().copied())
            .collect())
    }

    /// Adds covalent bonds between atoms closer than the sum of their covalent radii plus `tolerance`.
    ///
    /// Only pairs within a residue or between sequence-adjacent residues of the
    /// same chain are considered. Atoms with different alternate locations are
    /// never bonded. Returns the number of bonds added.
    pub fn infer_bonds(&mut self, tolerance: f64) -> usize {
        let mut pairs = Vec::new();
        for &cid in &self.chain_order {
            let chain = &self.chains[cid];
            for (i, &rid) in chain.residues.iter().enumerate() {
                let residue = &self.residues[rid];
                for (&a, &b) in residue.atoms.iter().tuple_combinations() {
                    if self.within_bonding_distance(a, b, tolerance) {
                        pairs.push((a, b));
                    }
                }
                if let Some(&next_rid) = chain.residues.get(i + 1) {
                    let next = &self.residues[next_rid];
                    for (&a, &b) in residue.atoms.iter().cartesian_product(next.atoms.iter()) {
                        if self.within_bonding_distance(a, b, tolerance) {
                            pairs.push((a, b));
                        }
                    }
                }
            }
        }

        let before = self.bonds.len();
        for (a, b) in pairs {
            self.add_bond(a, b);
        }
        self.bonds.len() - before
    }

    fn within_bonding_distance(&self, a: AtomId, b: AtomId, tolerance: f64) -> bool {
        let (Some(atom_a), Some(atom_b)) = (self.atoms.get(a), self.atoms.get(b)) else {
            return false;
        };
        if let (Some(alt_a), Some(alt_b)) = (atom_a.alt_loc, atom_b.alt_loc) {
            if alt_a != alt_b {
                return false;
            }
        }
        let cutoff = covalent_radius(&atom_a.element) + covalent_radius(&atom_b.element) + tolerance;
        nalgebra::distance(&atom_a.position, &atom_b.position) <= cutoff
    }
}
