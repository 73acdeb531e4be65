use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tlsmd::engine::progress::{Progress, ProgressCallback, Stage};

const SPINNER_TICK_MS: u64 = 80;
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
const BAR_TEMPLATE: &str = "{msg:<16} [{bar:40.cyan/blue}] {pos}/{len} {per_sec:>10} ({eta})";

/// Draws workflow stages on one bar: a spinner while windows are planned, a
/// counted bar while windows are fitted or groups analyzed.
///
/// Skipped chains and groups are printed above the bar.
#[derive(Clone)]
pub struct CliProgressHandler {
    bar: ProgressBar,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_draw_target(target);
        Self { bar }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let bar = self.bar.clone();
        Box::new(move |event| render(&bar, event))
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn render(bar: &ProgressBar, event: Progress) {
    match event {
        Progress::StageStarted { stage, units } => start_stage(bar, stage, units),
        Progress::UnitDone => bar.inc(1),
        Progress::StageFinished { stage } => {
            bar.disable_steady_tick();
            if let Some(len) = bar.length() {
                bar.set_position(len);
            }
            bar.finish_with_message(format!("✓ {stage}"));
        }
        Progress::ChainSkipped { chain_id, residues } => bar.println(format!(
            "  chain {chain_id}: {residues} amino-acid residue(s), shorter than the window; not searched"
        )),
        Progress::GroupSkipped { name, reason } => {
            bar.println(format!("  TLS group '{name}' skipped: {reason}"))
        }
    }
}

fn start_stage(bar: &ProgressBar, stage: Stage, units: Option<u64>) {
    bar.reset();
    bar.set_message(stage.label());
    match units {
        Some(total) => {
            bar.disable_steady_tick();
            bar.set_style(bar_style());
            bar.set_length(total);
        }
        None => {
            bar.set_style(spinner_style());
            bar.set_length(0);
            bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
