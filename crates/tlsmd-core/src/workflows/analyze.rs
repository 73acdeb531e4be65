use crate::core::io::pdb::{PdbError, PdbFile};
use crate::core::io::traits::StructureFile;
use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::core::tls::cor::CenterOfReaction;
use crate::core::tls::description::{DescriptionError, ResidueRange, TlsGroupDescription};
use crate::core::tls::group::{TlsGroup, TlsStatistics};
use crate::core::tls::tensors::{TlsTensors, calc_utls};
use crate::core::utils::units::{RAD2DEG, RAD2DEG2};
use crate::engine::error::EngineError;
use crate::engine::overlay::with_predicted_adps;
use crate::engine::progress::{Progress, ProgressReporter, Stage};
use nalgebra::{Matrix3, Point3, Vector3};
use std::io::{self, Write};
use tracing::{info, instrument, warn};

/// Pitches below this magnitude (deg/Å) are reported as pure rotations.
const NEGLIGIBLE_PITCH: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisConfig {
    /// Refit every group, ignoring tensors carried by its description.
    pub refit: bool,
}

/// The analysis of one TLS group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAnalysis {
    pub name: String,
    pub num_atoms: usize,
    pub refitted: bool,
    /// Origin of calculation.
    pub origin: Point3<f64>,
    /// Tensors about the origin of calculation.
    pub tensors: TlsTensors,
    pub cor: CenterOfReaction,
    /// Statistics of the model about its center of reaction.
    pub stats: TlsStatistics,
}

impl GroupAnalysis {
    /// The group about its center of reaction, described by `ranges`.
    pub fn to_description(&self, ranges: Vec<ResidueRange>) -> TlsGroupDescription {
        TlsGroupDescription {
            name: self.name.clone(),
            origin: Some(self.cor.cor),
            t: Some(self.cor.prime.t),
            l: Some(self.cor.prime.l),
            s: Some(self.cor.prime.s),
            ranges,
        }
    }
}

#[derive(Debug, Default)]
pub struct AnalysisResult {
    /// Index of the source description paired with its analysis.
    pub groups: Vec<(usize, GroupAnalysis)>,
    /// Descriptions that could not be bound or fitted.
    pub skipped: Vec<(usize, EngineError)>,
}

impl AnalysisResult {
    /// Analyzed groups rewritten about their centers of reaction.
    pub fn descriptions(&self, sources: &[TlsGroupDescription]) -> Vec<TlsGroupDescription> {
        self.groups
            .iter()
            .filter_map(|(index, analysis)| {
                sources
                    .get(*index)
                    .map(|desc| analysis.to_description(desc.ranges.clone()))
            })
            .collect()
    }
}

/// Binds every description to its atoms. A description that fails does not affect its siblings.
pub fn bind_descriptions<'a>(
    structure: &'a Structure,
    descriptions: &[TlsGroupDescription],
) -> Vec<Result<TlsGroup<'a>, DescriptionError>> {
    descriptions
        .iter()
        .map(|desc| {
            desc.generate_tls_group(structure).inspect_err(|e| {
                warn!(group = %desc.name, error = %e, "Skipping TLS group description.");
            })
        })
        .collect()
}

/// A single group made of every amino-acid atom of the structure, origin at its centroid.
pub fn amino_acid_group(structure: &Structure) -> TlsGroup<'_> {
    let mut group = TlsGroup::new("ALL");
    for (_, chain) in structure.chains_iter() {
        for &rid in chain.residues() {
            let Some(residue) = structure.residue(rid) else {
                continue;
            };
            if !residue.is_amino_acid() {
                continue;
            }
            for atom in residue.atoms().iter().filter_map(|&aid| structure.atom(aid)) {
                group.append(atom);
            }
        }
    }
    if let Some(centroid) = group.centroid() {
        group.origin = centroid;
    }
    group
}

/// Fits the group when asked to or when it carries no tensors, then resolves its center of reaction.
///
/// On return the group has been moved to its center of reaction.
pub fn analyze_group(group: &mut TlsGroup<'_>, refit: bool) -> Result<GroupAnalysis, EngineError> {
    let refitted = refit || group.is_null();
    if refitted {
        group.fit().map_err(|source| EngineError::Fit {
            group: group.name.clone(),
            source,
        })?;
    }
    let origin = group.origin;
    let tensors = group.tensors;
    let cor = group.shift_cor();
    let stats = group.calc_tls_info();

    Ok(GroupAnalysis {
        name: group.name.clone(),
        num_atoms: group.len(),
        refitted,
        origin,
        tensors,
        cor,
        stats,
    })
}

#[instrument(skip_all, name = "tls_analysis_workflow")]
pub fn run(
    structure: &Structure,
    descriptions: &[TlsGroupDescription],
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
) -> Result<AnalysisResult, EngineError> {
    let stage = reporter.stage(Stage::GroupAnalysis, Some(descriptions.len() as u64));

    let mut result = AnalysisResult::default();
    for (index, (desc, bound)) in descriptions
        .iter()
        .zip(bind_descriptions(structure, descriptions))
        .enumerate()
    {
        let outcome = bound
            .map_err(EngineError::from)
            .and_then(|mut group| analyze_group(&mut group, config.refit));
        match outcome {
            Ok(analysis) => result.groups.push((index, analysis)),
            Err(e) => {
                if matches!(e, EngineError::Fit { .. }) {
                    warn!(error = %e, "TLS group could not be fitted.");
                }
                reporter.report(Progress::GroupSkipped {
                    name: desc.name.clone(),
                    reason: e.to_string(),
                });
                result.skipped.push((index, e));
            }
        }
        stage.unit_done();
    }
    drop(stage);
    info!(
        analyzed = result.groups.len(),
        skipped = result.skipped.len(),
        "TLS analysis complete."
    );
    Ok(result)
}

/// Model-predicted U of every atom selected by a description that carries tensors.
///
/// Null descriptions and descriptions whose ranges do not resolve are logged and skipped.
pub fn predict_adps(
    structure: &Structure,
    descriptions: &[TlsGroupDescription],
) -> Vec<(AtomId, Matrix3<f64>)> {
    let mut predictions = Vec::new();
    for desc in descriptions {
        let (Some(origin), Some(tensors)) = (desc.origin, desc.tensors()) else {
            warn!(group = %desc.name, "TLS group has no tensors; atoms keep their ADPs.");
            continue;
        };
        for range in &desc.ranges {
            match structure.resolve_range(range.chain_id, &range.frag_id1, &range.frag_id2) {
                Ok(atom_ids) => predictions.extend(atom_ids.into_iter().filter_map(|aid| {
                    structure
                        .atom(aid)
                        .map(|atom| (aid, calc_utls(&tensors, &(atom.position - origin))))
                })),
                Err(e) => warn!(group = %desc.name, error = %e, "Skipping residue range."),
            }
        }
    }
    predictions
}

/// Writes `structure` as PDB with `predictions` in place of the experimental ADPs.
///
/// The structure's own ADPs are unchanged afterwards.
pub fn render_predicted_adps(
    structure: &mut Structure,
    predictions: &[(AtomId, Matrix3<f64>)],
    writer: &mut impl Write,
) -> Result<(), PdbError> {
    with_predicted_adps(structure, predictions, |overlaid| {
        PdbFile::write_to(overlaid, writer)
    })
}

fn vector_str(v: &Vector3<f64>) -> String {
    format!("{:>7.3}{:>7.3}{:>7.3}", v.x, v.y, v.z)
}

fn row_str(m: &Matrix3<f64>, i: usize) -> String {
    vector_str(&m.row(i).transpose())
}

fn write_tensor_block(
    w: &mut impl Write,
    title: &str,
    labels: [&str; 3],
    tensors: &TlsTensors,
) -> io::Result<()> {
    writeln!(w, "{title}")?;
    writeln!(
        w,
        "     {:<24}{:<24}{}",
        format!("{} TENSOR", labels[0]),
        format!("{} TENSOR", labels[1]),
        format!("{} TENSOR", labels[2])
    )?;
    writeln!(w, "     (A^2)                   (DEG^2)                 (A DEG)")?;
    let l = tensors.l * RAD2DEG2;
    let s = tensors.s * RAD2DEG;
    for i in 0..3 {
        writeln!(
            w,
            "   {}   {}   {}",
            row_str(&tensors.t, i),
            row_str(&l, i),
            row_str(&s, i)
        )?;
    }
    Ok(())
}

/// Writes a TLSANL-style report of one analyzed group.
pub fn write_report(analysis: &GroupAnalysis, w: &mut impl Write) -> io::Result<()> {
    let cor = &analysis.cor;
    writeln!(w, "TLS GROUP: {}  ({} ATOMS)", analysis.name, analysis.num_atoms)?;
    writeln!(
        w,
        "ORIGIN OF CALCULATIONS (A): {}",
        vector_str(&analysis.origin.coords)
    )?;
    writeln!(w)?;

    write_tensor_block(
        w,
        "INPUT TENSOR MATRICES WRT ORTHOGONAL AXES USING ORIGIN OF CALCULATIONS",
        ["T", "L", "S"],
        &analysis.tensors,
    )?;
    writeln!(w)?;
    let t_trace = analysis.tensors.t.trace();
    writeln!(w, "TRACE OF TRANSLATION TENSOR               {t_trace:.3}")?;
    writeln!(w, "MEAN TRANSLATION (TRACE/3)                {:.3}", t_trace / 3.0)?;
    writeln!(
        w,
        "MEAN LIBRATION   (TRACE/3)                {:.3}",
        analysis.tensors.l.trace() * RAD2DEG2 / 3.0
    )?;
    writeln!(w)?;

    write_tensor_block(
        w,
        "TENSOR MATRICES WRT LIBRATION AXES USING ORIGIN OF CALCULATIONS",
        ["T^", "L^", "S^"],
        &cor.hat,
    )?;
    writeln!(w)?;
    writeln!(
        w,
        "ORIGIN SHIFT RHO(O)^ TO CENTRE WRT LIBRATION AXES (A): {}",
        vector_str(&cor.rho_hat)
    )?;
    writeln!(
        w,
        "ORIGIN SHIFT TO CENTRE WRT ORTHOGONAL AXES        (A): {}",
        vector_str(&cor.rho)
    )?;
    writeln!(
        w,
        "TLS CENTRE OF REACTION WRT ORTHOGONAL AXES        (A): {}",
        vector_str(&cor.cor.coords)
    )?;
    writeln!(w)?;

    write_tensor_block(
        w,
        "TENSOR MATRICES WRT LIBRATION AXES USING CENTRE OF REACTION",
        ["T'^", "L'^", "S'^"],
        &cor.prime_hat,
    )?;
    writeln!(w)?;
    write_tensor_block(
        w,
        "TENSOR MATRICES WRT ORTHOGONAL AXES USING CENTRE OF REACTION",
        ["T'", "L'", "S'"],
        &cor.prime,
    )?;
    writeln!(w)?;
    writeln!(w, "TRACE(T')/3.0   (A^2): {:.3}", cor.prime.t.trace() / 3.0)?;
    writeln!(w, "TRACE(L')/3.0 (DEG^2): {:.3}", cor.prime.l.trace() / 3.0 * RAD2DEG2)?;
    writeln!(w, "TRACE(S')/3.0 (A*DEG): {:.3}", cor.prime.s.trace() / 3.0 * RAD2DEG)?;
    writeln!(w)?;

    writeln!(w, "SHIFT OF LIBRATION AXES TO DIAGONALIZE S WRT ORTHOGONAL AXES")?;
    writeln!(w, "FROM THE CENTRE OF REACTION (A):")?;
    for (i, axis) in cor.screw_axes.iter().enumerate() {
        writeln!(w, "L{} (A): {}", i + 1, vector_str(&axis.rho))?;
    }
    writeln!(w)?;

    writeln!(w, "SCREW PITCH OF THE 3 NON-INTERSECTING LIBRATION AXES")?;
    for (i, (axis, lib)) in cor.screw_axes.iter().zip(&cor.l_axes).enumerate() {
        let pitch = axis.pitch * RAD2DEG;
        if pitch.abs() > NEGLIGIBLE_PITCH {
            writeln!(
                w,
                "L{} {:>10.3} DEG^2  PITCH (DEG/A) (A/DEG): {:>10.3} {:>10.3}",
                i + 1,
                lib.value * RAD2DEG2,
                pitch,
                1.0 / pitch
            )?;
        } else {
            writeln!(
                w,
                "L{} {:>10.3} DEG^2  PITCH (DEG/A) (A/DEG): {:>10.3} {:>10}",
                i + 1,
                lib.value * RAD2DEG2,
                0.0,
                "-"
            )?;
        }
    }
    writeln!(w)?;

    let stats = &analysis.stats;
    match &stats.fit {
        Some(fit) => {
            let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{x:.4}"));
            writeln!(w, "VALID MODEL: YES")?;
            writeln!(w, "R FACTOR:                {}", opt(fit.r_factor))?;
            writeln!(w, "MEAN DP2:                {}", opt(fit.dp2.map(|m| m.mean)))?;
            writeln!(w, "MEAN SUIJ:               {}", opt(fit.suij.map(|m| m.mean)))?;
            writeln!(w, "TLS MEAN B:              {}", opt(fit.tls_mean_temp_factor))?;
        }
        None => writeln!(w, "VALID MODEL: NO")?,
    }
    if let Some(b) = stats.exp_mean_temp_factor {
        writeln!(w, "EXPERIMENTAL MEAN B:     {b:.4}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::tls::tensors::symmetric;
    use crate::core::utils::units::u_to_b;

    fn model() -> TlsTensors {
        TlsTensors::new(
            symmetric(0.04, 0.03, 0.05, 0.004, -0.002, 0.001),
            symmetric(0.002, 0.0015, 0.0025, 0.0003, 0.0, -0.0002),
            Matrix3::new(0.0004, 0.0006, 0.0, -0.0002, -0.0001, 0.0003, 0.0005, 0.0, -0.0003),
        )
    }

    fn model_origin() -> Point3<f64> {
        Point3::new(0.5, -0.5, 6.0)
    }

    /// Eight residues of five atoms along a helix-like path, ADPs from `model()`;
    /// plus one water.
    fn structure() -> Structure {
        let offsets = [
            [-0.52, 0.81, 0.33],
            [0.0, 0.0, 0.0],
            [0.93, 0.41, -0.52],
            [1.21, 1.34, 0.18],
            [-0.31, -1.02, 0.74],
        ];
        let mut structure = Structure::new();
        let chain = structure.add_chain('A');
        for i in 0..8 {
            let rid = structure
                .add_residue(chain, &(i + 1).to_string(), "GLY")
                .unwrap();
            let angle = (100.0 * i as f64).to_radians();
            let center = Vector3::new(2.3 * angle.cos(), 2.3 * angle.sin(), 1.5 * i as f64);
            for (k, off) in offsets.iter().enumerate() {
                let pos = Point3::from(center + Vector3::from(*off));
                let mut atom = Atom::new(["N", "CA", "C", "O", "CB"][k], rid, pos);
                let u = calc_utls(&model(), &(pos - model_origin()));
                atom.temp_factor = u_to_b(u.trace() / 3.0);
                atom.u = Some(u);
                structure.add_atom_to_residue(rid, atom).unwrap();
            }
        }
        let water = structure.add_residue(chain, "101", "HOH").unwrap();
        let mut ow = Atom::new("O", water, Point3::new(10.0, 10.0, 10.0));
        ow.temp_factor = 30.0;
        structure.add_atom_to_residue(water, ow).unwrap();
        structure
    }

    fn description(first: &str, last: &str) -> TlsGroupDescription {
        let mut desc = TlsGroupDescription::new(format!("A{first}-A{last}"));
        desc.ranges.push(ResidueRange::new('A', first, last));
        desc
    }

    fn with_model(mut desc: TlsGroupDescription) -> TlsGroupDescription {
        let m = model();
        desc.origin = Some(model_origin());
        desc.t = Some(m.t);
        desc.l = Some(m.l);
        desc.s = Some(m.s);
        desc
    }

    #[test]
    fn null_description_is_fitted_and_recovers_model() {
        let structure = structure();
        let descs = vec![description("1", "8")];
        let result = run(&structure, &descs, &AnalysisConfig::default(), &ProgressReporter::new()).unwrap();

        assert!(result.skipped.is_empty());
        let (index, analysis) = &result.groups[0];
        assert_eq!(*index, 0);
        assert!(analysis.refitted);
        assert_eq!(analysis.num_atoms, 40);
        assert!(analysis.stats.valid_model);
        assert!(analysis.stats.fit.as_ref().unwrap().dp2.unwrap().mean.abs() < 1e-8);

        // The fit is about the centroid; its predictions must match the generating model.
        let shifted = model().shift_origin(&(analysis.origin - model_origin()));
        assert!((analysis.tensors.l - shifted.l).abs().max() < 1e-8);
        assert!((analysis.tensors.t - shifted.t).abs().max() < 1e-8);
    }

    #[test]
    fn carried_tensors_are_used_without_refit() {
        let structure = structure();
        let descs = vec![with_model(description("1", "8"))];
        let result = run(&structure, &descs, &AnalysisConfig::default(), &ProgressReporter::new()).unwrap();
        let (_, analysis) = &result.groups[0];
        assert!(!analysis.refitted);
        assert_eq!(analysis.origin, model_origin());
        assert_eq!(analysis.tensors, model());

        let exported = result.descriptions(&descs);
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].origin, Some(analysis.cor.cor));
        assert_eq!(exported[0].ranges, descs[0].ranges);
    }

    #[test]
    fn failing_description_does_not_affect_siblings() {
        let structure = structure();
        let descs = vec![description("1", "99"), description("1", "8"), description("6", "2")];
        let skipped_names = std::sync::Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::GroupSkipped { name, .. } = event {
                skipped_names.lock().unwrap().push(name);
            }
        }));
        let result = run(&structure, &descs, &AnalysisConfig::default(), &reporter).unwrap();
        drop(reporter);

        assert_eq!(skipped_names.into_inner().unwrap(), vec!["A1-A99", "A6-A2"]);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].0, 1);
        let skipped: Vec<usize> = result.skipped.iter().map(|(i, _)| *i).collect();
        assert_eq!(skipped, vec![0, 2]);
        assert!(matches!(result.skipped[0].1, EngineError::Description(_)));
    }

    #[test]
    fn too_small_group_reports_fit_error() {
        let structure = structure();
        let descs = vec![description("1", "3")];
        let result = run(
            &structure,
            &descs,
            &AnalysisConfig { refit: true },
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(result.groups.is_empty());
        assert!(matches!(result.skipped[0].1, EngineError::Fit { .. }));
    }

    #[test]
    fn amino_acid_group_excludes_waters() {
        let structure = structure();
        let group = amino_acid_group(&structure);
        assert_eq!(group.len(), 40);
        assert!(group.is_null());
    }

    #[test]
    fn predictions_cover_selected_atoms_only() {
        let structure = structure();
        let descs = vec![with_model(description("2", "3")), description("4", "8")];
        let predictions = predict_adps(&structure, &descs);
        assert_eq!(predictions.len(), 10);
        for (aid, u) in &predictions {
            let atom = structure.atom(*aid).unwrap();
            assert!((atom.u.unwrap() - u).abs().max() < 1e-12);
        }
    }

    #[test]
    fn rendering_leaves_structure_untouched() {
        let mut structure = structure();
        let (aid, original) = structure
            .atoms_iter()
            .find(|(_, atom)| atom.name == "CA")
            .map(|(aid, atom)| (aid, atom.clone()))
            .unwrap();
        let replacement = Matrix3::identity() * 0.5;

        let mut out = Vec::new();
        render_predicted_adps(&mut structure, &[(aid, replacement)], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        // B = 8π²·0.5 ≈ 39.48 on the first CA record.
        let ca_line = text
            .lines()
            .find(|l| l.starts_with("ATOM") && &l[12..16] == " CA ")
            .unwrap();
        assert_eq!(ca_line[60..66].trim(), "39.48");
        assert!(text.contains("  5000   5000   5000      0      0      0"));

        let restored = structure.atom(aid).unwrap();
        assert_eq!(restored.temp_factor, original.temp_factor);
        assert_eq!(restored.u, original.u);
    }

    #[test]
    fn report_contains_tlsanl_sections() {
        let structure = structure();
        let descs = vec![with_model(description("1", "8"))];
        let result = run(&structure, &descs, &AnalysisConfig::default(), &ProgressReporter::new()).unwrap();
        let mut out = Vec::new();
        write_report(&result.groups[0].1, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("TLS GROUP: A1-A8  (40 ATOMS)\n"));
        assert!(text.contains("TLS CENTRE OF REACTION WRT ORTHOGONAL AXES"));
        assert!(text.contains("SCREW PITCH OF THE 3 NON-INTERSECTING LIBRATION AXES"));
        assert!(text.contains("VALID MODEL: YES"));
        assert!(text.contains("ORIGIN OF CALCULATIONS (A):   0.500 -0.500  6.000"));
    }
}
