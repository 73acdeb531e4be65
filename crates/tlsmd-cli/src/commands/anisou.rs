use super::analyze::load_descriptions;
use crate::cli::AnisouArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use std::fs::File;
use std::io::{BufWriter, Write};
use tlsmd::{
    core::io::{pdb::PdbFile, traits::StructureFile},
    engine::progress::ProgressReporter,
    workflows::analyze::{self, AnalysisConfig},
};
use tracing::{info, warn};

pub fn run(args: AnisouArgs) -> Result<()> {
    info!("Loading input structure from {:?}", &args.input);
    let mut structure =
        PdbFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
            path: args.input.clone(),
            source: e.into(),
        })?;
    let descriptions = load_descriptions(&args.source, &args.input)?.ok_or_else(|| {
        CliError::Argument("TLS groups are required; pass --tls PATH or --remark".to_string())
    })?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let config = AnalysisConfig { refit: args.refit };
    let result = analyze::run(&structure, &descriptions, &config, &reporter)?;
    for (index, error) in &result.skipped {
        let name = descriptions.get(*index).map_or("?", |d| d.name.as_str());
        warn!(group = name, error = %error, "TLS group skipped; its atoms keep their ADPs.");
    }

    let models = result.descriptions(&descriptions);
    let predictions = analyze::predict_adps(&structure, &models);
    info!(
        groups = models.len(),
        atoms = predictions.len(),
        "Rendering TLS-predicted ADPs."
    );

    let file = File::create(&args.output)?;
    let mut writer = BufWriter::new(file);
    analyze::render_predicted_adps(&mut structure, &predictions, &mut writer).map_err(|e| {
        CliError::FileWriting {
            path: args.output.clone(),
            source: e.into(),
        }
    })?;
    writer.flush()?;

    println!(
        "✓ Predicted ADPs of {} atom(s) written to: {}",
        predictions.len(),
        args.output.display()
    );
    Ok(())
}
