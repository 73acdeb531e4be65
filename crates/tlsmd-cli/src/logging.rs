use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::{
    Layer,
    filter::{LevelFilter, Targets},
    fmt::{self, format::FmtSpan},
    prelude::*,
    registry::LookupSpan,
};

/// Crates whose events are ours; everything else is held to `WARN` in the log file.
const OWN_TARGETS: [&str; 2] = ["tlsmd", "tlsmd_cli"];

/// Console level: `-q` keeps errors only, each `-v` lowers the threshold one step.
pub fn console_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// The log file keeps at least the per-window `DEBUG` outcomes of the search,
/// whatever the console shows.
pub fn file_filter(console: LevelFilter) -> Targets {
    let own = console.max(LevelFilter::DEBUG);
    OWN_TARGETS
        .iter()
        .fold(Targets::new().with_default(LevelFilter::WARN), |targets, &target| {
            targets.with_target(target, own)
        })
}

fn file_layer<S>(file: File, console: LevelFilter) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(file_filter(console))
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let console = console_level(verbosity, quiet);
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console);

    let file_layer = match log_file {
        Some(path) => Some(file_layer(File::create(path).map_err(CliError::Io)?, console)),
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Config(format!("Logging is already initialized: {e}")))
}
