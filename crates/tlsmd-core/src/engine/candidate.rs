use crate::core::io::report::CandidateRow;
use crate::core::models::ids::{AtomId, ResidueId};
use crate::core::tls::cor::CenterOfReaction;
use crate::core::tls::description::{ResidueRange, TlsGroupDescription};
use crate::core::tls::fit::FitError;
use crate::core::tls::group::TlsStatistics;
use crate::core::tls::tensors::TlsTensors;
use nalgebra::Point3;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Fewer atoms than the fit needs survived the filter.
    TooFewAtoms { found: usize, required: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    FitFailed(FitError),
    InvalidModel,
    NegativeLibration { max_eigenvalue_deg2: f64 },
    UndefinedScore,
    PoorFit { mean_dp2: f64 },
    InvalidReducedT,
    /// Passed every gate but a chain neighbour scored at least as well.
    NotLocalOptimum,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CandidateStatus {
    Skipped(SkipReason),
    Rejected(RejectReason),
    Accepted,
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateStatus::Skipped(_) => write!(f, "skipped"),
            CandidateStatus::Rejected(_) => write!(f, "rejected"),
            CandidateStatus::Accepted => write!(f, "accepted"),
        }
    }
}

impl CandidateStatus {
    /// Short machine-readable reason, empty for accepted windows.
    pub fn reason(&self) -> String {
        match self {
            CandidateStatus::Skipped(SkipReason::TooFewAtoms { found, required }) => {
                format!("too_few_atoms({found}<{required})")
            }
            CandidateStatus::Rejected(reason) => match reason {
                RejectReason::FitFailed(e) => format!("fit_failed({e})"),
                RejectReason::InvalidModel => "invalid_model".to_string(),
                RejectReason::NegativeLibration { .. } => "negative_libration".to_string(),
                RejectReason::UndefinedScore => "undefined_score".to_string(),
                RejectReason::PoorFit { .. } => "poor_fit".to_string(),
                RejectReason::InvalidReducedT => "invalid_reduced_t".to_string(),
                RejectReason::NotLocalOptimum => "not_local_optimum".to_string(),
            },
            CandidateStatus::Accepted => String::new(),
        }
    }
}

/// Results of the fit of one window, about its center of reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedWindow {
    /// Origin the least-squares fit was performed about (the atom centroid).
    pub calc_origin: Point3<f64>,
    /// Tensors referred to the center of reaction.
    pub tensors: TlsTensors,
    pub cor: CenterOfReaction,
    pub stats: TlsStatistics,
}

/// An owned snapshot of one window of the segment search.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCandidate {
    pub chain_id: char,
    /// Index of the first residue of the window within the searched residues of the chain.
    pub position: usize,
    pub frag_id_first: String,
    pub frag_id_last: String,
    pub residue_ids: Vec<ResidueId>,
    pub atom_ids: Vec<AtomId>,
    pub fitted: Option<FittedWindow>,
    pub status: CandidateStatus,
}

impl SegmentCandidate {
    pub fn name(&self) -> String {
        format!(
            "{}{}-{}{}",
            self.chain_id, self.frag_id_first, self.chain_id, self.frag_id_last
        )
    }

    pub fn is_accepted(&self) -> bool {
        self.status == CandidateStatus::Accepted
    }

    /// Mean DP2 of the fit, when the model was valid and the score defined.
    pub fn mean_dp2(&self) -> Option<f64> {
        self.fitted
            .as_ref()
            .and_then(|f| f.stats.fit.as_ref())
            .and_then(|q| q.dp2)
            .map(|ms| ms.mean)
    }

    /// A TLSOUT-ready description of the window, origin at the center of reaction.
    pub fn to_description(&self) -> TlsGroupDescription {
        let mut desc = TlsGroupDescription::new(self.name());
        desc.ranges.push(ResidueRange::new(
            self.chain_id,
            self.frag_id_first.clone(),
            self.frag_id_last.clone(),
        ));
        if let Some(fitted) = &self.fitted {
            desc.origin = Some(fitted.cor.cor);
            desc.t = Some(fitted.tensors.t);
            desc.l = Some(fitted.tensors.l);
            desc.s = Some(fitted.tensors.s);
        }
        desc
    }

    pub fn to_report_row(&self, retained: bool) -> CandidateRow {
        let stats = self.fitted.as_ref().map(|f| &f.stats);
        let quality = stats.and_then(|s| s.fit.as_ref());
        CandidateRow {
            chain: self.chain_id,
            first_fragment: self.frag_id_first.clone(),
            last_fragment: self.frag_id_last.clone(),
            window_start: self.position,
            num_atoms: self.atom_ids.len(),
            status: self.status.to_string(),
            reason: self.status.reason(),
            r_factor: quality.and_then(|q| q.r_factor),
            mean_dp2: quality.and_then(|q| q.dp2).map(|ms| ms.mean),
            sigma_dp2: quality.and_then(|q| q.dp2).map(|ms| ms.sigma),
            mean_suij: quality.and_then(|q| q.suij).map(|ms| ms.mean),
            max_l_eigenvalue_deg2: stats.map(|s| s.l_eigenvalues_deg2[2]),
            retained,
        }
    }
}
