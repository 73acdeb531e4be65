use crate::engine::candidate::{CandidateStatus, RejectReason, SegmentCandidate};
use std::collections::HashMap;
use tracing::debug;

/// Keeps the accepted windows that score strictly better than their accepted chain neighbours.
///
/// Neighbours are the windows at `position - 1` and `position + 1`; a window
/// with no accepted neighbour is kept. Losing windows are marked
/// [`RejectReason::NotLocalOptimum`]. Returns the indices of the kept windows
/// in input order.
pub fn run(candidates: &mut [SegmentCandidate]) -> Vec<usize> {
    let survivors: Vec<(usize, usize, f64)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_accepted())
        .map(|(i, c)| (i, c.position, c.mean_dp2().unwrap_or(f64::INFINITY)))
        .collect();

    let scored: Vec<(usize, f64)> = survivors.iter().map(|&(_, pos, dp2)| (pos, dp2)).collect();
    let keep = local_optima(&scored);

    let mut retained = Vec::new();
    for (&(index, position, _), kept) in survivors.iter().zip(keep) {
        if kept {
            retained.push(index);
        } else {
            debug!(position, "Window outranked by a neighbour.");
            candidates[index].status = CandidateStatus::Rejected(RejectReason::NotLocalOptimum);
        }
    }
    retained
}

/// For each `(position, score)` pair, whether its score is strictly lower than
/// the score at each adjacent position present in the list.
fn local_optima(scored: &[(usize, f64)]) -> Vec<bool> {
    let by_position: HashMap<usize, f64> = scored.iter().copied().collect();
    scored
        .iter()
        .map(|&(position, score)| {
            let left = position
                .checked_sub(1)
                .and_then(|p| by_position.get(&p));
            let right = by_position.get(&(position + 1));
            [left, right]
                .into_iter()
                .flatten()
                .all(|&neighbour| score < neighbour)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::candidate::SkipReason;

    #[test]
    fn interior_window_must_beat_both_neighbours() {
        let scored = [(0, 0.05), (1, 0.02), (2, 0.04), (3, 0.03), (4, 0.01)];
        assert_eq!(
            local_optima(&scored),
            vec![false, true, false, false, true]
        );
    }

    #[test]
    fn run_ends_compare_with_single_neighbour() {
        assert_eq!(local_optima(&[(0, 0.01), (1, 0.02)]), vec![true, false]);
        assert_eq!(local_optima(&[(7, 0.03), (8, 0.02)]), vec![false, true]);
    }

    #[test]
    fn ties_are_not_retained() {
        assert_eq!(local_optima(&[(0, 0.02), (1, 0.02)]), vec![false, false]);
    }

    #[test]
    fn isolated_window_is_retained() {
        assert_eq!(local_optima(&[(4, 0.09)]), vec![true]);
    }

    #[test]
    fn list_neighbours_at_distant_positions_are_not_compared() {
        // Positions 0 and 3 are adjacent in the survivor list but not on the chain.
        assert_eq!(local_optima(&[(0, 0.02), (3, 0.01)]), vec![true, true]);

        // Position 5 loses to 6; position 2 is isolated despite its list neighbour 5.
        assert_eq!(
            local_optima(&[(2, 0.08), (5, 0.05), (6, 0.03)]),
            vec![true, false, true]
        );
    }

    #[test]
    fn non_accepted_windows_are_untouched() {
        let skipped = CandidateStatus::Skipped(SkipReason::TooFewAtoms {
            found: 10,
            required: 20,
        });
        let mut candidates = vec![SegmentCandidate {
            chain_id: 'A',
            position: 0,
            frag_id_first: "1".into(),
            frag_id_last: "6".into(),
            residue_ids: Vec::new(),
            atom_ids: Vec::new(),
            fitted: None,
            status: skipped.clone(),
        }];
        assert!(run(&mut candidates).is_empty());
        assert_eq!(candidates[0].status, skipped);
    }
}
