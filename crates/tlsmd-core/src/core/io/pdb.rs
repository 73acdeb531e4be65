use crate::core::io::traits::StructureFile;
use crate::core::models::atom::{Atom, guess_element};
use crate::core::models::ids::AtomId;
use crate::core::models::residue::Residue;
use crate::core::models::structure::Structure;
use nalgebra::{Matrix3, Point3};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// ANISOU records store U in units of 10⁻⁴ Å².
const ANISOU_SCALE: f64 = 1.0e-4;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: PdbParseErrorKind,
    },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: &'static str, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: &'static str, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: &'static str },
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

/// Record name from columns 1-6; unpadded short records such as `END` are kept whole.
fn record_name(line: &str) -> &str {
    line.get(..line.len().min(6)).unwrap_or("").trim()
}

fn parse_field<T: std::str::FromStr>(
    line: &str,
    start: usize,
    end: usize,
    columns: &'static str,
    line_num: usize,
    invalid: fn(&'static str, String) -> PdbParseErrorKind,
) -> Result<T, PdbError> {
    let value = slice_and_trim(line, start, end);
    if value.is_empty() {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::MissingRequiredField { columns },
        });
    }
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: invalid(columns, value.to_string()),
    })
}

fn invalid_int(columns: &'static str, value: String) -> PdbParseErrorKind {
    PdbParseErrorKind::InvalidInt { columns, value }
}

fn invalid_float(columns: &'static str, value: String) -> PdbParseErrorKind {
    PdbParseErrorKind::InvalidFloat { columns, value }
}

/// Optional float column: blank means `default`, anything else must parse.
///
/// A line that ends before the last column of the field reads as blank, so a
/// truncated record keeps the default occupancy (1.0) or B (0.0) instead of being
/// reported as short.
fn parse_optional_float(
    line: &str,
    start: usize,
    end: usize,
    columns: &'static str,
    line_num: usize,
    default: f64,
) -> Result<f64, PdbError> {
    if slice_and_trim(line, start, end).is_empty() {
        Ok(default)
    } else {
        parse_field(line, start, end, columns, line_num, invalid_float)
    }
}

fn char_at(line: &str, index: usize) -> Option<char> {
    line.get(index..index + 1)
        .and_then(|s| s.chars().next())
        .filter(|c| *c != ' ')
}

/// Splits a fragment id such as `"42A"` into sequence number and insertion code.
fn split_fragment_id(fragment_id: &str) -> (&str, char) {
    match fragment_id.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() && i > 0 => (&fragment_id[..i], c),
        _ => (fragment_id, ' '),
    }
}

/// Atom names of one-letter elements start in column 14 unless they fill all four columns.
fn format_atom_name(atom: &Atom) -> String {
    if atom.name.len() < 4 && atom.element.len() <= 1 {
        format!(" {:<3}", atom.name)
    } else {
        format!("{:<4}", atom.name)
    }
}

pub struct PdbFile;

impl StructureFile for PdbFile {
    type Error = PdbError;

    /// Reads ATOM, HETATM and ANISOU records of the first model.
    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::new();
        let mut serial_map: HashMap<usize, AtomId> = HashMap::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            match record_name(&line) {
                "ENDMDL" | "END" => break,
                "ATOM" | "HETATM" => {
                    let serial: usize =
                        parse_field(&line, 6, 11, "7-11", line_num, invalid_int)?;
                    let name = slice_and_trim(&line, 12, 16);
                    if name.is_empty() {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::MissingRequiredField { columns: "13-16" },
                        });
                    }
                    let alt_loc = char_at(&line, 16);
                    let res_name = slice_and_trim(&line, 17, 20);
                    let chain_char = line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' ');
                    let res_seq = slice_and_trim(&line, 22, 26);
                    if res_seq.is_empty() {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::MissingRequiredField { columns: "23-26" },
                        });
                    }
                    let fragment_id = format!("{}{}", res_seq, slice_and_trim(&line, 26, 27));

                    let x: f64 = parse_field(&line, 30, 38, "31-38", line_num, invalid_float)?;
                    let y: f64 = parse_field(&line, 38, 46, "39-46", line_num, invalid_float)?;
                    let z: f64 = parse_field(&line, 46, 54, "47-54", line_num, invalid_float)?;
                    let occupancy = parse_optional_float(&line, 54, 60, "55-60", line_num, 1.0)?;
                    let temp_factor = parse_optional_float(&line, 60, 66, "61-66", line_num, 0.0)?;
                    let element = slice_and_trim(&line, 76, 78).to_ascii_uppercase();

                    if serial_map.contains_key(&serial) {
                        return Err(PdbError::Inconsistency(format!(
                            "Duplicate atom serial: {}",
                            serial
                        )));
                    }

                    let chain_id = structure.add_chain(chain_char);
                    let residue_id = structure
                        .add_residue(chain_id, &fragment_id, res_name)
                        .ok_or_else(|| {
                            PdbError::Inconsistency(format!("Cannot add residue {fragment_id}"))
                        })?;

                    let mut atom = Atom::new(name, residue_id, Point3::new(x, y, z));
                    atom.serial = serial;
                    atom.alt_loc = alt_loc;
                    atom.occupancy = occupancy;
                    atom.temp_factor = temp_factor;
                    atom.element = if element.is_empty() {
                        guess_element(name)
                    } else {
                        element
                    };

                    let atom_id = structure
                        .add_atom_to_residue(residue_id, atom)
                        .ok_or_else(|| {
                            PdbError::Inconsistency(format!("Cannot add atom {serial}"))
                        })?;
                    serial_map.insert(serial, atom_id);
                }
                "ANISOU" => {
                    let serial: usize =
                        parse_field(&line, 6, 11, "7-11", line_num, invalid_int)?;
                    let atom_id = *serial_map.get(&serial).ok_or_else(|| {
                        PdbError::MissingRecord(format!(
                            "ATOM record for ANISOU serial {serial} (line {line_num})"
                        ))
                    })?;

                    const COLUMNS: [(usize, &str); 6] = [
                        (28, "29-35"),
                        (35, "36-42"),
                        (42, "43-49"),
                        (49, "50-56"),
                        (56, "57-63"),
                        (63, "64-70"),
                    ];
                    let mut u = [0.0; 6];
                    for (slot, (start, columns)) in u.iter_mut().zip(COLUMNS) {
                        let raw: i64 =
                            parse_field(&line, start, start + 7, columns, line_num, invalid_int)?;
                        *slot = raw as f64 * ANISOU_SCALE;
                    }
                    let [u11, u22, u33, u12, u13, u23] = u;
                    if let Some(atom) = structure.atom_mut(atom_id) {
                        atom.u = Some(Matrix3::new(u11, u12, u13, u12, u22, u23, u13, u23, u33));
                    }
                }
                _ => {}
            }
        }

        if structure.atom_count() == 0 {
            return Err(PdbError::MissingRecord("ATOM/HETATM".to_string()));
        }
        Ok(structure)
    }

    /// Writes ATOM/HETATM and ANISOU records with fresh serials, a TER per chain, and END.
    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        let mut serial = 0usize;
        for (_, chain) in structure.chains_iter() {
            let mut last_residue: Option<&Residue> = None;
            for residue in chain.residues().iter().filter_map(|&rid| structure.residue(rid)) {
                let record = if residue.is_amino_acid() {
                    "ATOM"
                } else {
                    "HETATM"
                };
                let (res_seq, i_code) = split_fragment_id(&residue.fragment_id);
                for atom in residue.atoms().iter().filter_map(|&aid| structure.atom(aid)) {
                    serial += 1;
                    let name = format_atom_name(atom);
                    let alt = atom.alt_loc.unwrap_or(' ');
                    writeln!(
                        writer,
                        "{:<6}{:>5} {}{}{:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
                        record,
                        serial,
                        name,
                        alt,
                        residue.name,
                        chain.id,
                        res_seq,
                        i_code,
                        atom.position.x,
                        atom.position.y,
                        atom.position.z,
                        atom.occupancy,
                        atom.temp_factor,
                        atom.element
                    )?;
                    if let Some(u) = atom.u {
                        let scaled = |i: usize, j: usize| (u[(i, j)] / ANISOU_SCALE).round() as i64;
                        writeln!(
                            writer,
                            "ANISOU{:>5} {}{}{:>3} {}{:>4}{} {:>7}{:>7}{:>7}{:>7}{:>7}{:>7}      {:>2}",
                            serial,
                            name,
                            alt,
                            residue.name,
                            chain.id,
                            res_seq,
                            i_code,
                            scaled(0, 0),
                            scaled(1, 1),
                            scaled(2, 2),
                            scaled(0, 1),
                            scaled(0, 2),
                            scaled(1, 2),
                            atom.element
                        )?;
                    }
                }
                last_residue = Some(residue);
            }

            if let Some(residue) = last_residue {
                serial += 1;
                let (res_seq, i_code) = split_fragment_id(&residue.fragment_id);
                writeln!(
                    writer,
                    "TER   {:>5}      {:>3} {}{:>4}{}",
                    serial, residue.name, chain.id, res_seq, i_code
                )?;
            }
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}
