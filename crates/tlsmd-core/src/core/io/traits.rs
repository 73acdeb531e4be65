use crate::core::models::structure::Structure;
use crate::core::tls::description::TlsGroupDescription;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors shared by the TLS description formats.
///
/// Any of these fails the whole load; no partial result is returned.
#[derive(Debug, Error)]
pub enum TlsFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: TlsParseErrorKind,
    },
    #[error("Line {line}: TLS record appears before any TLS group")]
    OrphanRecord { line: usize },
    #[error("TLS group '{group}': {tensor} tensor is missing components")]
    IncompleteTensor { group: String, tensor: char },
    #[error("Line {line}: residue range spans chains '{first}' and '{last}'")]
    SpanningRange { line: usize, first: char, last: char },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TlsParseErrorKind {
    #[error("Invalid number '{value}'")]
    InvalidFloat { value: String },
    #[error("{record} record expects {expected} values, found {found}")]
    FieldCount {
        record: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Malformed residue range")]
    MalformedRange,
    #[error("Label '{label}' has no value")]
    MissingValue { label: String },
}

/// Parses whitespace-separated floats, requiring exactly `expected` of them.
pub(crate) fn parse_floats(
    text: &str,
    expected: usize,
    record: &'static str,
    line: usize,
) -> Result<Vec<f64>, TlsFormatError> {
    let values = text
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| TlsFormatError::Parse {
                line,
                kind: TlsParseErrorKind::InvalidFloat {
                    value: token.to_string(),
                },
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;
    if values.len() != expected {
        return Err(TlsFormatError::Parse {
            line,
            kind: TlsParseErrorKind::FieldCount {
                record,
                expected,
                found: values.len(),
            },
        });
    }
    Ok(values)
}

/// Defines the interface for reading and writing TLS group description files.
pub trait TlsDescriptionFormat {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every group description from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if any record is malformed; the whole load fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Vec<TlsGroupDescription>, Self::Error>;

    /// Writes group descriptions to a writer.
    fn write_to(
        descriptions: &[TlsGroupDescription],
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<TlsGroupDescription>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(
        descriptions: &[TlsGroupDescription],
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(descriptions, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Defines the interface for reading and writing coordinate files.
pub trait StructureFile {
    type Error: Error + From<io::Error>;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error>;

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Structure, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(structure: &Structure, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(structure, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
