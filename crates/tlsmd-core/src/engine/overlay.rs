use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::core::utils::units::u_to_b;
use nalgebra::Matrix3;
use std::collections::HashMap;
use tracing::debug;

/// Temporarily replaces atomic displacement parameters with model predictions.
///
/// The original temperature factor and anisotropic tensor of every touched
/// atom are recorded on first change and written back when the overlay drops,
/// whichever way the enclosing scope is left.
pub struct AdpOverlay<'s> {
    structure: &'s mut Structure,
    saved: HashMap<AtomId, (f64, Option<Matrix3<f64>>)>,
}

impl<'s> AdpOverlay<'s> {
    pub fn new(structure: &'s mut Structure) -> Self {
        Self {
            structure,
            saved: HashMap::new(),
        }
    }

    /// Sets `u` and its equivalent isotropic B on `atom_id`. Returns `false` for an unknown atom.
    pub fn apply(&mut self, atom_id: AtomId, u: Matrix3<f64>) -> bool {
        let Some(atom) = self.structure.atom_mut(atom_id) else {
            return false;
        };
        self.saved
            .entry(atom_id)
            .or_insert((atom.temp_factor, atom.u));
        atom.temp_factor = u_to_b(u.trace() / 3.0);
        atom.u = Some(u);
        true
    }

    pub fn structure(&self) -> &Structure {
        &*self.structure
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

impl Drop for AdpOverlay<'_> {
    fn drop(&mut self) {
        for (atom_id, (temp_factor, u)) in self.saved.drain() {
            if let Some(atom) = self.structure.atom_mut(atom_id) {
                atom.temp_factor = temp_factor;
                atom.u = u;
            }
        }
        debug!("Restored original ADPs.");
    }
}

/// Runs `action` against `structure` with `predictions` overlaid, then restores the originals.
pub fn with_predicted_adps<R, E>(
    structure: &mut Structure,
    predictions: &[(AtomId, Matrix3<f64>)],
    action: impl FnOnce(&Structure) -> Result<R, E>,
) -> Result<R, E> {
    let mut overlay = AdpOverlay::new(structure);
    for &(atom_id, u) in predictions {
        overlay.apply(atom_id, u);
    }
    action(overlay.structure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn fixture() -> (Structure, AtomId, AtomId) {
        let mut structure = Structure::new();
        let chain = structure.add_chain('A');
        let rid = structure.add_residue(chain, "1", "ALA").unwrap();
        let mut ca = Atom::new("CA", rid, Point3::origin());
        ca.temp_factor = 20.0;
        let mut cb = Atom::new("CB", rid, Point3::new(1.5, 0.0, 0.0));
        cb.temp_factor = 25.0;
        cb.u = Some(Matrix3::identity() * 0.3);
        let a = structure.add_atom_to_residue(rid, ca).unwrap();
        let b = structure.add_atom_to_residue(rid, cb).unwrap();
        (structure, a, b)
    }

    #[test]
    fn overlay_is_visible_inside_and_restored_after() {
        let (mut structure, a, b) = fixture();
        let predicted = Matrix3::identity() * 0.1;

        let seen = with_predicted_adps(&mut structure, &[(a, predicted), (b, predicted)], |s| {
            Ok::<_, ()>((s.atom(a).unwrap().u, s.atom(b).unwrap().temp_factor))
        })
        .unwrap();
        assert_eq!(seen.0, Some(predicted));
        assert!((seen.1 - u_to_b(0.1)).abs() < 1e-12);

        assert_eq!(structure.atom(a).unwrap().u, None);
        assert_eq!(structure.atom(a).unwrap().temp_factor, 20.0);
        assert_eq!(structure.atom(b).unwrap().u, Some(Matrix3::identity() * 0.3));
    }

    #[test]
    fn originals_restored_when_action_fails() {
        let (mut structure, a, _) = fixture();
        let result: Result<(), String> =
            with_predicted_adps(&mut structure, &[(a, Matrix3::identity())], |_| {
                Err("write failed".to_string())
            });
        assert!(result.is_err());
        assert_eq!(structure.atom(a).unwrap().u, None);
        assert_eq!(structure.atom(a).unwrap().temp_factor, 20.0);
    }

    #[test]
    fn originals_restored_on_panic() {
        let (mut structure, a, _) = fixture();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut overlay = AdpOverlay::new(&mut structure);
            overlay.apply(a, Matrix3::identity());
            panic!("renderer crashed");
        }));
        assert!(outcome.is_err());
        assert_eq!(structure.atom(a).unwrap().temp_factor, 20.0);
    }

    #[test]
    fn repeated_override_restores_first_original() {
        let (mut structure, a, _) = fixture();
        {
            let mut overlay = AdpOverlay::new(&mut structure);
            assert!(overlay.apply(a, Matrix3::identity()));
            assert!(overlay.apply(a, Matrix3::identity() * 2.0));
            assert_eq!(overlay.len(), 1);
        }
        assert_eq!(structure.atom(a).unwrap().u, None);
        assert_eq!(structure.atom(a).unwrap().temp_factor, 20.0);
    }
}
