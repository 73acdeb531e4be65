use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One line of the candidate report. Undefined statistics are written as empty fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRow {
    pub chain: char,
    pub first_fragment: String,
    pub last_fragment: String,
    pub window_start: usize,
    pub num_atoms: usize,
    pub status: String,
    pub reason: String,
    pub r_factor: Option<f64>,
    pub mean_dp2: Option<f64>,
    pub sigma_dp2: Option<f64>,
    pub mean_suij: Option<f64>,
    pub max_l_eigenvalue_deg2: Option<f64>,
    pub retained: bool,
}

pub fn write_candidate_report<W: Write>(rows: &[CandidateRow], writer: W) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_candidate_report_path<P: AsRef<Path>>(
    rows: &[CandidateRow],
    path: P,
) -> Result<(), ReportError> {
    let file = File::create(path)?;
    write_candidate_report(rows, io::BufWriter::new(file))
}
