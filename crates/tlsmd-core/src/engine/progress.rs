//! Progress events of the search and analysis workflows.
//!
//! A workflow moves through [`Stage`]s. A stage that knows its amount of work
//! announces it when it starts and then reports one [`Progress::UnitDone`] per
//! fitted window or analyzed group. Events may arrive from several threads.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Selecting the chains to search and counting their windows.
    WindowPlanning,
    /// Fitting one TLS model per residue window.
    SegmentFitting,
    /// Fitting and scoring the groups of existing TLS descriptions.
    GroupAnalysis,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::WindowPlanning => "Window Planning",
            Stage::SegmentFitting => "Segment Fitting",
            Stage::GroupAnalysis => "Group Analysis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// `units` is the number of [`Progress::UnitDone`] events that follow, if known.
    StageStarted { stage: Stage, units: Option<u64> },
    UnitDone,
    StageFinished { stage: Stage },
    /// A searched chain has fewer amino-acid residues than the window width.
    ChainSkipped { chain_id: char, residues: usize },
    /// A TLS group could not be analyzed; its siblings are unaffected.
    GroupSkipped { name: String, reason: String },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Reports the start of `stage`; the returned guard reports its end when dropped,
    /// including on an early error return.
    pub fn stage(&self, stage: Stage, units: Option<u64>) -> StageGuard<'_, 'a> {
        self.report(Progress::StageStarted { stage, units });
        StageGuard {
            reporter: self,
            stage,
        }
    }
}

#[must_use = "the stage finishes as soon as the guard is dropped"]
pub struct StageGuard<'r, 'a> {
    reporter: &'r ProgressReporter<'a>,
    stage: Stage,
}

impl StageGuard<'_, '_> {
    #[inline]
    pub fn unit_done(&self) {
        self.reporter.report(Progress::UnitDone);
    }
}

impl Drop for StageGuard<'_, '_> {
    fn drop(&mut self) {
        self.reporter
            .report(Progress::StageFinished { stage: self.stage });
    }
}
