use super::config::SearchConfig;
use crate::core::models::atom::Atom;
use crate::core::models::ids::{AtomId, ResidueId};
use crate::core::models::residue::is_main_chain_atom;
use crate::core::models::structure::Structure;

/// Applies the atom-selection switches of a [`SearchConfig`].
#[derive(Debug, Clone, Copy)]
pub struct AtomFilter<'c> {
    config: &'c SearchConfig,
}

impl<'c> AtomFilter<'c> {
    pub fn new(config: &'c SearchConfig) -> Self {
        Self { config }
    }

    pub fn accepts(&self, structure: &Structure, atom_id: AtomId, atom: &Atom) -> bool {
        if !self.config.include_frac_occupancy && atom.occupancy < 1.0 {
            return false;
        }
        if !self.config.include_hydrogens && atom.is_hydrogen() {
            return false;
        }
        if !self.config.use_side_chains && !is_main_chain_atom(&atom.name) {
            return false;
        }
        if !self.config.include_single_bond && structure.bond_count(atom_id) <= 1 {
            return false;
        }
        true
    }

    /// The accepted atoms of `residue_ids`, residue by residue in file order.
    pub fn select<'s>(
        &self,
        structure: &'s Structure,
        residue_ids: &[ResidueId],
    ) -> Vec<(AtomId, &'s Atom)> {
        residue_ids
            .iter()
            .filter_map(|&rid| structure.residue(rid))
            .flat_map(|residue| residue.atoms().iter().copied())
            .filter_map(|aid| structure.atom(aid).map(|atom| (aid, atom)))
            .filter(|&(aid, atom)| self.accepts(structure, aid, atom))
            .collect()
    }
}
