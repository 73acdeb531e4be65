use super::group::TlsGroup;
use super::tensors::TlsTensors;
use crate::core::models::structure::{Structure, StructureError};
use nalgebra::{Matrix3, Point3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DescriptionError {
    #[error("TLS group '{name}': {source}")]
    Structure {
        name: String,
        #[source]
        source: StructureError,
    },
    #[error("TLS group '{0}' selects no atoms")]
    NoAtoms(String),
}

/// An inclusive residue range `frag_id1..=frag_id2` within one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidueRange {
    pub chain_id: char,
    pub frag_id1: String,
    pub frag_id2: String,
    /// Atom selection qualifier; "ALL" selects every atom of the range.
    pub selection: String,
}

impl ResidueRange {
    pub fn new(chain_id: char, frag_id1: impl Into<String>, frag_id2: impl Into<String>) -> Self {
        Self {
            chain_id,
            frag_id1: frag_id1.into(),
            frag_id2: frag_id2.into(),
            selection: "ALL".to_string(),
        }
    }
}

/// A TLS group as stored in a file: residue ranges plus optional origin and tensors.
///
/// L is held in rad² and S in rad·Å, converted by the readers and writers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TlsGroupDescription {
    pub name: String,
    pub origin: Option<Point3<f64>>,
    pub t: Option<Matrix3<f64>>,
    pub l: Option<Matrix3<f64>>,
    pub s: Option<Matrix3<f64>>,
    pub ranges: Vec<ResidueRange>,
}

impl TlsGroupDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True when the origin or any tensor is missing.
    pub fn is_null(&self) -> bool {
        self.tensors().is_none()
    }

    pub fn tensors(&self) -> Option<TlsTensors> {
        self.origin?;
        Some(TlsTensors::new(self.t?, self.l?, self.s?))
    }

    /// A display name derived from the ranges, e.g. `A1-A20;B5-B9`.
    pub fn calc_tls_name(&self) -> String {
        self.ranges
            .iter()
            .map(|r| format!("{}{}-{}{}", r.chain_id, r.frag_id1, r.chain_id, r.frag_id2))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Binds the description to the atoms of `structure` it selects.
    ///
    /// Origin and tensors are copied when present; otherwise the origin is the
    /// atom centroid and the tensors are zero.
    pub fn generate_tls_group<'a>(
        &self,
        structure: &'a Structure,
    ) -> Result<TlsGroup<'a>, DescriptionError> {
        let name = if self.name.is_empty() {
            self.calc_tls_name()
        } else {
            self.name.clone()
        };

        let mut group = TlsGroup::new(name.clone());
        for range in &self.ranges {
            let atom_ids = structure
                .resolve_range(range.chain_id, &range.frag_id1, &range.frag_id2)
                .map_err(|source| DescriptionError::Structure {
                    name: name.clone(),
                    source,
                })?;
            for id in atom_ids {
                if let Some(atom) = structure.atom(id) {
                    group.append(atom);
                }
            }
        }
        if group.is_empty() {
            return Err(DescriptionError::NoAtoms(name));
        }

        match (self.origin, self.t, self.l, self.s) {
            (Some(origin), t, l, s) => {
                group.set_origin(origin.x, origin.y, origin.z);
                group.tensors = TlsTensors::new(
                    t.unwrap_or_else(Matrix3::zeros),
                    l.unwrap_or_else(Matrix3::zeros),
                    s.unwrap_or_else(Matrix3::zeros),
                );
            }
            (None, ..) => {
                if let Some(centroid) = group.centroid() {
                    group.origin = centroid;
                }
            }
        }
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::tls::tensors::symmetric;

    fn two_residue_structure() -> Structure {
        let mut structure = Structure::new();
        let chain = structure.add_chain('A');
        for (i, frag) in ["1", "2", "3"].iter().enumerate() {
            let rid = structure.add_residue(chain, frag, "GLY").unwrap();
            let x = i as f64 * 3.8;
            structure.add_atom_to_residue(rid, Atom::new("N", rid, Point3::new(x, 0.0, 0.0))).unwrap();
            structure.add_atom_to_residue(rid, Atom::new("CA", rid, Point3::new(x + 1.4, 0.0, 0.0))).unwrap();
        }
        structure
    }

    #[test]
    fn name_is_built_from_ranges() {
        let mut desc = TlsGroupDescription::new("");
        desc.ranges.push(ResidueRange::new('A', "1", "20"));
        desc.ranges.push(ResidueRange::new('B', "5", "9A"));
        assert_eq!(desc.calc_tls_name(), "A1-A20;B5-B9A");
    }

    #[test]
    fn generate_group_copies_tensors_and_selects_atoms() {
        let structure = two_residue_structure();
        let mut desc = TlsGroupDescription::new("g1");
        desc.ranges.push(ResidueRange::new('A', "2", "3"));
        desc.origin = Some(Point3::new(1.0, 2.0, 3.0));
        desc.t = Some(symmetric(0.1, 0.1, 0.1, 0.0, 0.0, 0.0));
        desc.l = Some(symmetric(0.01, 0.01, 0.01, 0.0, 0.0, 0.0));
        desc.s = Some(Matrix3::zeros());

        let group = desc.generate_tls_group(&structure).unwrap();
        assert_eq!(group.len(), 4);
        assert_eq!(group.origin, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(group.tensors.t, desc.t.unwrap());
        assert!(!desc.is_null());
    }

    #[test]
    fn missing_origin_falls_back_to_centroid() {
        let structure = two_residue_structure();
        let mut desc = TlsGroupDescription::new("g2");
        desc.ranges.push(ResidueRange::new('A', "1", "1"));
        let group = desc.generate_tls_group(&structure).unwrap();
        assert!((group.origin - Point3::new(0.7, 0.0, 0.0)).norm() < 1e-12);
        assert!(desc.is_null());
    }

    #[test]
    fn unresolvable_range_is_an_error() {
        let structure = two_residue_structure();
        let mut desc = TlsGroupDescription::new("g3");
        desc.ranges.push(ResidueRange::new('A', "1", "99"));
        assert!(matches!(
            desc.generate_tls_group(&structure),
            Err(DescriptionError::Structure { .. })
        ));

        let empty = TlsGroupDescription::new("g4");
        assert_eq!(
            empty.generate_tls_group(&structure).unwrap_err(),
            DescriptionError::NoAtoms("g4".to_string())
        );
    }
}
