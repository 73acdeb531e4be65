use crate::cli::SearchArgs;
use crate::config::PartialTlsmdConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use tlsmd::{
    core::io::{
        pdb::PdbFile,
        report::write_candidate_report_path,
        tlsout::TlsoutFile,
        traits::{StructureFile, TlsDescriptionFormat},
    },
    engine::progress::ProgressReporter,
    workflows::{self, search::SearchResult},
};
use tracing::{info, warn};

pub fn run(args: SearchArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialTlsmdConfig::from_file(path)?,
        None => PartialTlsmdConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let settings = partial_config.merge_with_cli(&args)?;

    info!("Loading input structure from {:?}", &args.input);
    let mut structure =
        PdbFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
            path: args.input.clone(),
            source: e.into(),
        })?;

    if !settings.config.include_single_bond {
        let bonds = structure.infer_bonds(settings.bond_tolerance);
        info!(
            bonds,
            tolerance = settings.bond_tolerance,
            "Inferred covalent bonds from distances."
        );
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting segment search...");
    info!("Invoking the segment search workflow...");
    let result = workflows::search::run(&structure, &settings.config, &reporter)?;

    print_summary(&result);

    if let Some(path) = &args.csv {
        info!("Writing candidate report to {:?}", path);
        write_candidate_report_path(&result.report_rows(), path).map_err(|e| {
            CliError::FileWriting {
                path: path.clone(),
                source: e.into(),
            }
        })?;
        println!("✓ Candidate report written to: {}", path.display());
    }

    if let Some(path) = &args.tlsout {
        let descriptions = result.retained_descriptions();
        if descriptions.is_empty() {
            warn!("No segment was retained; the TLSOUT file will be empty.");
        }
        TlsoutFile::write_to_path(&descriptions, path).map_err(|e| CliError::FileWriting {
            path: path.clone(),
            source: e.into(),
        })?;
        println!(
            "✓ {} retained segment(s) written to: {}",
            descriptions.len(),
            path.display()
        );
    }

    Ok(())
}

fn print_summary(result: &SearchResult) {
    if result.chains.is_empty() {
        println!("Warning: no chain was long enough to search.");
        return;
    }
    for chain in &result.chains {
        println!(
            "Chain {}: {} window(s), {} retained",
            chain.chain_id,
            chain.candidates.len(),
            chain.retained.len()
        );
        for candidate in chain.retained_candidates() {
            let dp2 = candidate
                .mean_dp2()
                .map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
            println!(
                "  {:<16} atoms {:>4}  mean DP2 {}",
                candidate.name(),
                candidate.atom_ids.len(),
                dp2
            );
        }
    }
}
