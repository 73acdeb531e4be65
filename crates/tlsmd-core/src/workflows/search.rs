use crate::core::io::report::CandidateRow;
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use crate::core::tls::description::TlsGroupDescription;
use crate::engine::candidate::SegmentCandidate;
use crate::engine::config::SearchConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter, Stage, StageGuard};
use crate::engine::tasks::acceptance;
use crate::engine::tasks::segment_fit::{self, Window};
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Every window of one chain together with the indices of the retained ones.
#[derive(Debug, Clone)]
pub struct ChainSearchResult {
    pub chain_id: char,
    pub candidates: Vec<SegmentCandidate>,
    pub retained: Vec<usize>,
}

impl ChainSearchResult {
    pub fn retained_candidates(&self) -> impl Iterator<Item = &SegmentCandidate> {
        self.retained.iter().filter_map(|&i| self.candidates.get(i))
    }

    pub fn is_retained(&self, index: usize) -> bool {
        self.retained.contains(&index)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub chains: Vec<ChainSearchResult>,
}

impl SearchResult {
    pub fn candidate_count(&self) -> usize {
        self.chains.iter().map(|c| c.candidates.len()).sum()
    }

    /// Descriptions of the retained windows of every chain, in chain order.
    pub fn retained_descriptions(&self) -> Vec<TlsGroupDescription> {
        self.chains
            .iter()
            .flat_map(|chain| chain.retained_candidates())
            .map(SegmentCandidate::to_description)
            .collect()
    }

    /// One report row per window of every chain, in window order.
    pub fn report_rows(&self) -> Vec<CandidateRow> {
        self.chains
            .iter()
            .flat_map(|chain| {
                chain
                    .candidates
                    .iter()
                    .enumerate()
                    .map(|(i, c)| c.to_report_row(chain.is_retained(i)))
            })
            .collect()
    }
}

struct ChainPlan {
    chain_id: char,
    residue_ids: Vec<ResidueId>,
}

impl ChainPlan {
    fn window_count(&self, width: usize) -> usize {
        (self.residue_ids.len() + 1).saturating_sub(width)
    }
}

#[instrument(skip_all, name = "segment_search_workflow")]
pub fn run(
    structure: &Structure,
    config: &SearchConfig,
    reporter: &ProgressReporter,
) -> Result<SearchResult, EngineError> {
    config.validate()?;

    let plans = {
        let _planning = reporter.stage(Stage::WindowPlanning, None);
        plan_chains(structure, config, reporter)?
    };
    let total_windows: usize = plans
        .iter()
        .map(|p| p.window_count(config.residue_window_width))
        .sum();
    info!(
        chains = plans.len(),
        windows = total_windows,
        width = config.residue_window_width,
        "Planned segment search."
    );

    let fitting = reporter.stage(Stage::SegmentFitting, Some(total_windows as u64));

    #[cfg(not(feature = "parallel"))]
    let iterator = plans.iter();

    #[cfg(feature = "parallel")]
    let iterator = plans.par_iter();

    let chains: Vec<ChainSearchResult> = iterator
        .map(|plan| search_chain(structure, plan, config, &fitting))
        .collect();
    drop(fitting);

    let result = SearchResult { chains };
    info!(
        candidates = result.candidate_count(),
        retained = result.chains.iter().map(|c| c.retained.len()).sum::<usize>(),
        "Segment search complete."
    );
    Ok(result)
}

fn plan_chains(
    structure: &Structure,
    config: &SearchConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<ChainPlan>, EngineError> {
    if let Some(ids) = &config.chain_ids {
        if let Some(&missing) = ids.iter().find(|&&id| structure.find_chain_by_id(id).is_none()) {
            return Err(EngineError::ChainNotFound(missing));
        }
    }
    if !config.include_single_bond && structure.bonds().is_empty() {
        warn!("Single-bond atoms are excluded but the structure has no bonds; every atom will be filtered out.");
    }

    let mut plans = Vec::new();
    for (_, chain) in structure.chains_iter() {
        if !config.searches_chain(chain.id) {
            continue;
        }
        let residue_ids: Vec<ResidueId> = chain
            .residues()
            .iter()
            .copied()
            .filter(|&rid| structure.residue(rid).is_some_and(|r| r.is_amino_acid()))
            .collect();
        if residue_ids.len() < config.residue_window_width {
            info!(
                chain = %chain.id,
                residues = residue_ids.len(),
                "Chain shorter than the window; skipped."
            );
            reporter.report(Progress::ChainSkipped {
                chain_id: chain.id,
                residues: residue_ids.len(),
            });
            continue;
        }
        plans.push(ChainPlan {
            chain_id: chain.id,
            residue_ids,
        });
    }
    Ok(plans)
}

#[instrument(skip_all, fields(chain = %plan.chain_id))]
fn search_chain(
    structure: &Structure,
    plan: &ChainPlan,
    config: &SearchConfig,
    fitting: &StageGuard,
) -> ChainSearchResult {
    let windows: Vec<Window> = plan
        .residue_ids
        .windows(config.residue_window_width)
        .enumerate()
        .map(|(position, residue_ids)| Window {
            chain_id: plan.chain_id,
            position,
            residue_ids,
        })
        .collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = windows.iter();

    #[cfg(feature = "parallel")]
    let iterator = windows.par_iter();

    let mut candidates: Vec<SegmentCandidate> = iterator
        .map(|&window| {
            let candidate = segment_fit::run(structure, window, config);
            fitting.unit_done();
            candidate
        })
        .collect();

    let retained = acceptance::run(&mut candidates);
    info!(
        windows = candidates.len(),
        accepted = retained.len(),
        "Chain search finished."
    );

    ChainSearchResult {
        chain_id: plan.chain_id,
        candidates,
        retained,
    }
}
