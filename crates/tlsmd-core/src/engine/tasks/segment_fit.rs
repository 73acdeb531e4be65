use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use crate::core::tls::fit::MIN_ATOMS;
use crate::core::tls::group::{TlsGroup, TlsStatistics};
use crate::core::tls::tensors::min_eigenvalue;
use crate::engine::candidate::{
    CandidateStatus, FittedWindow, RejectReason, SegmentCandidate, SkipReason,
};
use crate::engine::config::SearchConfig;
use crate::engine::filter::AtomFilter;
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, warn};

/// Agreement required between predictions of fits about two different origins, Å².
const ORIGIN_SHIFT_TOLERANCE: f64 = 1e-4;

/// One window of consecutive residues of a chain.
#[derive(Debug, Clone, Copy)]
pub struct Window<'r> {
    pub chain_id: char,
    pub position: usize,
    pub residue_ids: &'r [ResidueId],
}

/// Filters, fits and scores one window.
///
/// Every outcome, including a skipped or rejected window, is returned as a
/// candidate; only the acceptance pass decides which survivors are kept.
pub fn run(structure: &Structure, window: Window<'_>, config: &SearchConfig) -> SegmentCandidate {
    let fragment = |rid: Option<&ResidueId>| {
        rid.and_then(|&rid| structure.residue(rid))
            .map(|r| r.fragment_id.clone())
            .unwrap_or_default()
    };
    let selected = AtomFilter::new(config).select(structure, window.residue_ids);

    let mut candidate = SegmentCandidate {
        chain_id: window.chain_id,
        position: window.position,
        frag_id_first: fragment(window.residue_ids.first()),
        frag_id_last: fragment(window.residue_ids.last()),
        residue_ids: window.residue_ids.to_vec(),
        atom_ids: selected.iter().map(|&(aid, _)| aid).collect(),
        fitted: None,
        status: CandidateStatus::Accepted,
    };

    if selected.len() < MIN_ATOMS {
        candidate.status = CandidateStatus::Skipped(SkipReason::TooFewAtoms {
            found: selected.len(),
            required: MIN_ATOMS,
        });
        debug!(window = %candidate.name(), atoms = selected.len(), "Window skipped.");
        return candidate;
    }

    let mut group = TlsGroup::from_atoms(
        candidate.name(),
        selected.iter().map(|&(_, atom)| atom).collect(),
    );
    if let Some(centroid) = group.centroid() {
        group.origin = centroid;
    }
    let calc_origin = group.origin;

    if let Err(e) = group.fit() {
        warn!(window = %group.name, error = %e, "TLS fit failed.");
        candidate.status = CandidateStatus::Rejected(RejectReason::FitFailed(e));
        return candidate;
    }

    if let Some(shift) = config.verify_origin_shift {
        match group.verify_origin_independence(&Vector3::from(shift), ORIGIN_SHIFT_TOLERANCE) {
            Ok(true) => {}
            Ok(false) => warn!(window = %group.name, "Fit depends on the choice of origin."),
            Err(e) => warn!(window = %group.name, error = %e, "Origin-shift refit failed."),
        }
    }

    let cor = group.shift_cor();
    let stats = group.calc_tls_info();
    let status = judge(&stats, &cor.t_reduced, config);

    debug!(
        window = %group.name,
        atoms = stats.num_atoms,
        status = %status,
        reason = %status.reason(),
        "Window fitted."
    );

    candidate.status = status;
    candidate.fitted = Some(FittedWindow {
        calc_origin,
        tensors: group.tensors,
        cor,
        stats,
    });
    candidate
}

/// Applies the rejection gates in order; the first failing gate names the reason.
fn judge(stats: &TlsStatistics, t_reduced: &Matrix3<f64>, config: &SearchConfig) -> CandidateStatus {
    let max_l = stats
        .l_eigenvalues_deg2
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if max_l < 0.0 {
        return CandidateStatus::Rejected(RejectReason::NegativeLibration {
            max_eigenvalue_deg2: max_l,
        });
    }
    if !stats.valid_model {
        return CandidateStatus::Rejected(RejectReason::InvalidModel);
    }
    let Some(mean_dp2) = stats.fit.as_ref().and_then(|q| q.dp2).map(|ms| ms.mean) else {
        return CandidateStatus::Rejected(RejectReason::UndefinedScore);
    };
    if mean_dp2 > config.dp2_reject_threshold {
        return CandidateStatus::Rejected(RejectReason::PoorFit { mean_dp2 });
    }
    if config.reject_invalid_reduced_t && min_eigenvalue(t_reduced) < 0.0 {
        return CandidateStatus::Rejected(RejectReason::InvalidReducedT);
    }
    CandidateStatus::Accepted
}
