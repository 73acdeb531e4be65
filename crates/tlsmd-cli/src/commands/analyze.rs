use crate::cli::{AnalyzeArgs, TlsSource};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tlsmd::{
    core::io::{
        pdb::PdbFile,
        remark::RemarkTlsFile,
        tlsout::TlsoutFile,
        traits::{StructureFile, TlsDescriptionFormat},
    },
    core::tls::description::TlsGroupDescription,
    engine::progress::ProgressReporter,
    workflows::analyze::{self, AnalysisConfig},
};
use tracing::{info, warn};

/// Loads the descriptions named by `source`, or `None` when no source was given.
pub fn load_descriptions(
    source: &TlsSource,
    input: &Path,
) -> Result<Option<Vec<TlsGroupDescription>>> {
    let (path, loaded) = if let Some(path) = &source.tls {
        info!("Loading TLS groups from {:?}", path);
        (path.as_path(), TlsoutFile::read_from_path(path))
    } else if source.remark {
        info!("Loading TLS groups from the REMARK 3 records of {:?}", input);
        (input, RemarkTlsFile::read_from_path(input))
    } else {
        return Ok(None);
    };
    let descriptions = loaded.map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    info!("Loaded {} TLS group description(s).", descriptions.len());
    Ok(Some(descriptions))
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    info!("Loading input structure from {:?}", &args.input);
    let structure = PdbFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;
    let descriptions = load_descriptions(&args.source, &args.input)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    match descriptions {
        Some(descriptions) => {
            let progress_handler = CliProgressHandler::new();
            let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
            let config = AnalysisConfig { refit: args.refit };
            let result = analyze::run(&structure, &descriptions, &config, &reporter)?;

            for (index, error) in &result.skipped {
                let name = descriptions
                    .get(*index)
                    .map_or("?", |d| d.name.as_str());
                warn!(group = name, error = %error, "TLS group skipped.");
            }
            for (_, analysis) in &result.groups {
                analyze::write_report(analysis, &mut out)?;
                writeln!(out)?;
            }
            out.flush()?;

            if let Some(path) = &args.tlsout {
                let analyzed = result.descriptions(&descriptions);
                TlsoutFile::write_to_path(&analyzed, path).map_err(|e| {
                    CliError::FileWriting {
                        path: path.clone(),
                        source: e.into(),
                    }
                })?;
                println!("✓ {} TLS group(s) written to: {}", analyzed.len(), path.display());
            }
        }
        None => {
            if args.tlsout.is_some() {
                return Err(CliError::Argument(
                    "--tlsout requires TLS groups from --tls or --remark".to_string(),
                ));
            }
            info!("No TLS groups given; fitting every amino-acid atom as one group.");
            let mut group = analyze::amino_acid_group(&structure);
            let analysis = analyze::analyze_group(&mut group, true)?;
            analyze::write_report(&analysis, &mut out)?;
            out.flush()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TLSOUT: &str = "\
REFMAC

TLS    first
RANGE  'A   1.' 'A  20.' ALL
ORIGIN   1.0000   2.0000   3.0000
T     0.1000   0.2000   0.3000   0.0000   0.0000   0.0000
L     1.0000   2.0000   3.0000   0.0000   0.0000   0.0000
S     0.0000   0.0000   0.0000   0.0000   0.0000   0.0000   0.0000   0.0000
";

    #[test]
    fn descriptions_are_loaded_from_the_named_source() {
        let dir = tempfile::tempdir().unwrap();
        let tls_path = dir.path().join("groups.tlsout");
        fs::write(&tls_path, TLSOUT).unwrap();

        let source = TlsSource {
            tls: Some(tls_path),
            remark: false,
        };
        let descriptions = load_descriptions(&source, Path::new("unused.pdb"))
            .unwrap()
            .unwrap();
        assert_eq!(descriptions.len(), 1);
        assert_eq!(descriptions[0].name, "first");
        assert!(!descriptions[0].is_null());
    }

    #[test]
    fn missing_source_yields_none() {
        let source = TlsSource {
            tls: None,
            remark: false,
        };
        assert!(load_descriptions(&source, Path::new("unused.pdb")).unwrap().is_none());
    }

    #[test]
    fn unreadable_source_is_a_parsing_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = TlsSource {
            tls: Some(dir.path().join("absent.tlsout")),
            remark: false,
        };
        assert!(matches!(
            load_descriptions(&source, Path::new("unused.pdb")),
            Err(CliError::FileParsing { .. })
        ));
    }
}
