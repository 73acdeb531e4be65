//! The standalone keyword format (REFMAC TLSIN/TLSOUT).
//!
//! ```text
//! TLS    hinge domain
//! RANGE  'A   1.' 'A  20.' ALL
//! ORIGIN   12.3450  -3.2100   7.0000
//! T     0.0200   0.0200   0.0200   0.0000   0.0000   0.0000
//! L    32.8281  65.6563  49.2422   0.0000   0.0000   0.0000
//! S     0.0000   0.0000   0.0000   0.0000   0.0000   0.0000   0.0000   0.0000
//! ```
//!
//! L is written in deg², S in deg·Å as `S22−S11 S11−S33 S12 S13 S23 S21 S31 S32`.

use super::traits::{TlsDescriptionFormat, TlsFormatError, TlsParseErrorKind, parse_floats};
use crate::core::tls::description::{ResidueRange, TlsGroupDescription};
use crate::core::tls::tensors::{s_components, symmetric, symmetric_components, trace_free_s};
use crate::core::utils::units::{DEG2RAD, DEG2RAD2, RAD2DEG, RAD2DEG2};
use nalgebra::Point3;
use std::io::{BufRead, Write};

pub struct TlsoutFile;

/// Fragment ids ending in a digit carry a trailing '.' in RANGE records.
fn encode_fragment_id(frag_id: &str) -> String {
    match frag_id.chars().last() {
        None => ".".to_string(),
        Some(c) if c.is_ascii_digit() => format!("{frag_id}."),
        Some(_) => frag_id.to_string(),
    }
}

fn decode_fragment_id(text: &str) -> String {
    let trimmed = text.trim();
    trimmed.strip_suffix('.').unwrap_or(trimmed).to_string()
}

fn parse_range(rest: &str, line: usize) -> Result<ResidueRange, TlsFormatError> {
    let malformed = || TlsFormatError::Parse {
        line,
        kind: TlsParseErrorKind::MalformedRange,
    };
    let parts: Vec<&str> = rest.split('\'').collect();
    if parts.len() < 5 {
        return Err(malformed());
    }

    let endpoint = |text: &str| -> Option<(char, String)> {
        let mut chars = text.chars();
        let chain_id = chars.next()?;
        Some((chain_id, decode_fragment_id(chars.as_str())))
    };
    let (chain1, frag1) = endpoint(parts[1]).ok_or_else(malformed)?;
    let (chain2, frag2) = endpoint(parts[3]).ok_or_else(malformed)?;
    if chain1 != chain2 {
        return Err(TlsFormatError::SpanningRange {
            line,
            first: chain1,
            last: chain2,
        });
    }

    let selection = parts[4].trim();
    let mut range = ResidueRange::new(chain1, frag1, frag2);
    if !selection.is_empty() {
        range.selection = selection.to_string();
    }
    Ok(range)
}

impl TlsDescriptionFormat for TlsoutFile {
    type Error = TlsFormatError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<TlsGroupDescription>, Self::Error> {
        let mut descriptions = Vec::new();
        let mut current: Option<TlsGroupDescription> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let trimmed = line.trim();
            let (keyword, rest) = trimmed
                .split_once(char::is_whitespace)
                .unwrap_or((trimmed, ""));

            if keyword == "TLS" {
                if let Some(done) = current.take() {
                    descriptions.push(done);
                }
                current = Some(TlsGroupDescription::new(rest.trim()));
                continue;
            }
            if !matches!(keyword, "RANGE" | "ORIGIN" | "T" | "L" | "S") {
                continue;
            }
            let desc = current
                .as_mut()
                .ok_or(TlsFormatError::OrphanRecord { line: line_num })?;

            match keyword {
                "RANGE" => desc.ranges.push(parse_range(rest, line_num)?),
                "ORIGIN" => {
                    let v = parse_floats(rest, 3, "ORIGIN", line_num)?;
                    desc.origin = Some(Point3::new(v[0], v[1], v[2]));
                }
                "T" => {
                    let v = parse_floats(rest, 6, "T", line_num)?;
                    desc.t = Some(symmetric(v[0], v[1], v[2], v[3], v[4], v[5]));
                }
                "L" => {
                    let v: Vec<f64> = parse_floats(rest, 6, "L", line_num)?
                        .into_iter()
                        .map(|x| x * DEG2RAD2)
                        .collect();
                    desc.l = Some(symmetric(v[0], v[1], v[2], v[3], v[4], v[5]));
                }
                "S" => {
                    let v: Vec<f64> = parse_floats(rest, 8, "S", line_num)?
                        .into_iter()
                        .map(|x| x * DEG2RAD)
                        .collect();
                    desc.s = Some(trace_free_s(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]));
                }
                _ => {}
            }
        }

        if let Some(done) = current.take() {
            descriptions.push(done);
        }
        Ok(descriptions)
    }

    fn write_to(
        descriptions: &[TlsGroupDescription],
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        writeln!(writer, "REFMAC")?;
        writeln!(writer)?;
        for desc in descriptions {
            writeln!(writer, "TLS    {}", desc.name)?;
            for range in &desc.ranges {
                writeln!(
                    writer,
                    "RANGE  '{}{:>5}' '{}{:>5}' {}",
                    range.chain_id,
                    encode_fragment_id(&range.frag_id1),
                    range.chain_id,
                    encode_fragment_id(&range.frag_id2),
                    range.selection
                )?;
            }
            if let Some(origin) = desc.origin {
                writeln!(
                    writer,
                    "ORIGIN {:8.4} {:8.4} {:8.4}",
                    origin.x, origin.y, origin.z
                )?;
            }
            if let Some(t) = desc.t {
                write_values(writer, "T  ", &symmetric_components(&t), 1.0)?;
            }
            if let Some(l) = desc.l {
                write_values(writer, "L  ", &symmetric_components(&l), RAD2DEG2)?;
            }
            if let Some(s) = desc.s {
                write_values(writer, "S  ", &s_components(&s), RAD2DEG)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

fn write_values(
    writer: &mut impl Write,
    keyword: &str,
    values: &[f64],
    scale: f64,
) -> Result<(), TlsFormatError> {
    write!(writer, "{keyword}")?;
    for v in values {
        write!(writer, " {:8.4}", v * scale)?;
    }
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn sample_descriptions() -> Vec<TlsGroupDescription> {
        let mut first = TlsGroupDescription::new("hinge domain");
        first.ranges.push(ResidueRange::new('A', "1", "20"));
        first.ranges.push(ResidueRange::new('A', "25B", "30"));
        first.origin = Some(Point3::new(12.345, -3.21, 7.0));
        first.t = Some(symmetric(0.0213, 0.0187, 0.0251, 0.0012, -0.0007, 0.0003));
        first.l = Some(symmetric(0.0031, 0.0024, 0.0017, 0.0002, -0.0001, 0.0004));
        first.s = Some(trace_free_s(0.0004, -0.0002, 0.0011, -0.0006, 0.0003, 0.0009, -0.0004, 0.0002));

        let mut second = TlsGroupDescription::new("");
        second.ranges.push(ResidueRange::new('B', "101", "140"));
        vec![first, second]
    }

    fn max_diff(a: &Matrix3<f64>, b: &Matrix3<f64>) -> f64 {
        (a - b).abs().max()
    }

    #[test]
    fn round_trip_preserves_values_to_four_decimals() {
        let descriptions = sample_descriptions();
        let dir = tempdir().unwrap();
        let path = dir.path().join("groups.tlsout");

        TlsoutFile::write_to_path(&descriptions, &path).unwrap();
        let loaded = TlsoutFile::read_from_path(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        let (a, b) = (&descriptions[0], &loaded[0]);
        assert_eq!(b.name, "hinge domain");
        assert_eq!(b.ranges, a.ranges);
        assert!((a.origin.unwrap() - b.origin.unwrap()).abs().max() <= 5e-5);
        assert!(max_diff(&a.t.unwrap(), &b.t.unwrap()) <= 5e-5);
        assert!(max_diff(&a.l.unwrap(), &b.l.unwrap()) * RAD2DEG2 <= 5e-5);
        assert!(max_diff(&a.s.unwrap(), &b.s.unwrap()) * RAD2DEG <= 1e-4);
        assert!(b.s.unwrap().trace().abs() < 1e-15);

        assert!(loaded[1].is_null());
        assert_eq!(loaded[1].ranges[0].frag_id2, "140");
    }

    #[test]
    fn fragment_ids_use_trailing_dot_convention() {
        assert_eq!(encode_fragment_id("20"), "20.");
        assert_eq!(encode_fragment_id("25B"), "25B");
        assert_eq!(encode_fragment_id(""), ".");
        assert_eq!(decode_fragment_id("  20."), "20");
        assert_eq!(decode_fragment_id(" 25B"), "25B");
    }

    #[test]
    fn written_layout_matches_refmac_style() {
        let mut out = Vec::new();
        TlsoutFile::write_to(&sample_descriptions()[..1], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("REFMAC\n\nTLS    hinge domain\n"));
        assert!(text.contains("RANGE  'A   1.' 'A  20.' ALL"));
        assert!(text.contains("RANGE  'A  25B' 'A  30.' ALL"));
        assert!(text.contains("ORIGIN  12.3450  -3.2100   7.0000"));
    }

    #[test]
    fn tensor_before_group_is_rejected() {
        let input = "REFMAC\n\nT  0.1 0.1 0.1 0.0 0.0 0.0\nTLS  late\n";
        let err = TlsoutFile::read_from(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(err, TlsFormatError::OrphanRecord { line: 3 }));
    }

    #[test]
    fn malformed_tensor_fails_whole_load() {
        let input = "TLS  ok\nT 0.1 0.1 0.1 0 0 0\nTLS bad\nL 1.0 2.0 x 0 0 0\n";
        let err = TlsoutFile::read_from(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(
            err,
            TlsFormatError::Parse {
                line: 4,
                kind: TlsParseErrorKind::InvalidFloat { .. }
            }
        ));

        let input = "TLS  short\nS 0.1 0.1 0.1\n";
        let err = TlsoutFile::read_from(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(
            err,
            TlsFormatError::Parse {
                kind: TlsParseErrorKind::FieldCount { expected: 8, found: 3, .. },
                ..
            }
        ));
    }

    #[test]
    fn range_across_chains_is_rejected() {
        let input = "TLS x\nRANGE  'A   1.' 'B  20.' ALL\n";
        let err = TlsoutFile::read_from(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(
            err,
            TlsFormatError::SpanningRange {
                first: 'A',
                last: 'B',
                ..
            }
        ));
    }
}
