//! TLS groups embedded in a PDB header as REFMAC `REMARK   3` records.

use super::traits::{TlsDescriptionFormat, TlsFormatError, TlsParseErrorKind, parse_floats};
use crate::core::tls::description::{ResidueRange, TlsGroupDescription};
use crate::core::tls::tensors::symmetric;
use crate::core::utils::units::{DEG2RAD, DEG2RAD2, RAD2DEG, RAD2DEG2};
use nalgebra::{Matrix3, Point3};
use std::io::{BufRead, Write};

const RECORD_PREFIX: &str = "REMARK   3";
const GROUP_PREFIX: &str = "TLS GROUP :";
const RANGE_PREFIX: &str = "RESIDUE RANGE :";
const ORIGIN_PREFIX: &str = "ORIGIN FOR THE GROUP (A):";

const SYMMETRIC_LABELS: [&str; 6] = ["11", "22", "33", "12", "13", "23"];
const FULL_LABELS: [&str; 9] = ["11", "12", "13", "21", "22", "23", "31", "32", "33"];

pub struct RemarkTlsFile;

/// Components of one group seen so far; tensors are completed when the group ends.
struct PendingGroup {
    desc: TlsGroupDescription,
    t: [Option<f64>; 6],
    l: [Option<f64>; 6],
    s: [Option<f64>; 9],
}

impl PendingGroup {
    fn new(name: &str) -> Self {
        Self {
            desc: TlsGroupDescription::new(name),
            t: [None; 6],
            l: [None; 6],
            s: [None; 9],
        }
    }

    fn set_component(&mut self, tensor: char, index: &str, value: f64) {
        let slot = match tensor {
            'T' => SYMMETRIC_LABELS
                .iter()
                .position(|l| *l == index)
                .map(|i| &mut self.t[i]),
            'L' => SYMMETRIC_LABELS
                .iter()
                .position(|l| *l == index)
                .map(|i| &mut self.l[i]),
            'S' => FULL_LABELS
                .iter()
                .position(|l| *l == index)
                .map(|i| &mut self.s[i]),
            _ => None,
        };
        if let Some(slot) = slot {
            *slot = Some(value);
        }
    }

    fn finish(mut self) -> Result<TlsGroupDescription, TlsFormatError> {
        let name = self.desc.name.clone();
        let incomplete = |tensor| TlsFormatError::IncompleteTensor {
            group: name.clone(),
            tensor,
        };

        if let Some(t) = complete(&self.t).ok_or_else(|| incomplete('T'))? {
            self.desc.t = Some(symmetric(t[0], t[1], t[2], t[3], t[4], t[5]));
        }
        if let Some(l) = complete(&self.l).ok_or_else(|| incomplete('L'))? {
            let l: Vec<f64> = l.iter().map(|x| x * DEG2RAD2).collect();
            self.desc.l = Some(symmetric(l[0], l[1], l[2], l[3], l[4], l[5]));
        }
        if let Some(s) = complete(&self.s).ok_or_else(|| incomplete('S'))? {
            self.desc.s = Some(Matrix3::from_row_slice(&s) * DEG2RAD);
        }
        Ok(self.desc)
    }
}

/// `Some(None)` if nothing was seen, `Some(Some(values))` if everything was,
/// `None` for a partially seen tensor.
fn complete<const N: usize>(slots: &[Option<f64>; N]) -> Option<Option<Vec<f64>>> {
    let seen = slots.iter().filter(|s| s.is_some()).count();
    match seen {
        0 => Some(None),
        n if n == N => Some(Some(slots.iter().flatten().copied().collect())),
        _ => None,
    }
}

/// Extracts `(label, value)` pairs such as `T11: 0.1234` or `S21:-0.0012`.
///
/// Only labels naming a T, L or S component are returned.
fn labelled_values(text: &str, line: usize) -> Result<Vec<(char, String, f64)>, TlsFormatError> {
    let mut pairs = Vec::new();
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        let Some((label, inline)) = token.split_once(':') else {
            continue;
        };
        let mut chars = label.chars();
        let Some(tensor @ ('T' | 'L' | 'S')) = chars.next() else {
            continue;
        };
        let index = chars.as_str();
        if index.len() != 2 || !index.chars().all(|c| matches!(c, '1'..='3')) {
            continue;
        }

        let raw = if inline.is_empty() {
            tokens.next().ok_or_else(|| TlsFormatError::Parse {
                line,
                kind: TlsParseErrorKind::MissingValue {
                    label: label.to_string(),
                },
            })?
        } else {
            inline
        };
        let value = raw.parse::<f64>().map_err(|_| TlsFormatError::Parse {
            line,
            kind: TlsParseErrorKind::InvalidFloat {
                value: raw.to_string(),
            },
        })?;
        pairs.push((tensor, index.to_string(), value));
    }
    Ok(pairs)
}

fn parse_residue_range(text: &str, line: usize) -> Result<ResidueRange, TlsFormatError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    let malformed = TlsFormatError::Parse {
        line,
        kind: TlsParseErrorKind::MalformedRange,
    };
    let [chain1, frag1, chain2, frag2] = fields.as_slice() else {
        return Err(malformed);
    };
    let (Some(c1), Some(c2)) = (chain1.chars().next(), chain2.chars().next()) else {
        return Err(malformed);
    };
    if chain1.len() != 1 || chain2.len() != 1 {
        return Err(malformed);
    }
    if c1 != c2 {
        return Err(TlsFormatError::SpanningRange {
            line,
            first: c1,
            last: c2,
        });
    }
    Ok(ResidueRange::new(c1, *frag1, *frag2))
}

impl TlsDescriptionFormat for RemarkTlsFile {
    type Error = TlsFormatError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<TlsGroupDescription>, Self::Error> {
        let mut descriptions = Vec::new();
        let mut current: Option<PendingGroup> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let Some(text) = line.strip_prefix(RECORD_PREFIX) else {
                continue;
            };
            let text = text.trim();

            if let Some(rest) = text.strip_prefix(GROUP_PREFIX) {
                if let Some(done) = current.take() {
                    descriptions.push(done.finish()?);
                }
                current = Some(PendingGroup::new(rest.trim()));
                continue;
            }

            if let Some(rest) = text.strip_prefix(RANGE_PREFIX) {
                let group = current
                    .as_mut()
                    .ok_or(TlsFormatError::OrphanRecord { line: line_num })?;
                group.desc.ranges.push(parse_residue_range(rest, line_num)?);
            } else if let Some(rest) = text.strip_prefix(ORIGIN_PREFIX) {
                let group = current
                    .as_mut()
                    .ok_or(TlsFormatError::OrphanRecord { line: line_num })?;
                let v = parse_floats(rest, 3, "ORIGIN", line_num)?;
                group.desc.origin = Some(Point3::new(v[0], v[1], v[2]));
            } else {
                let pairs = labelled_values(text, line_num)?;
                if pairs.is_empty() {
                    continue;
                }
                let group = current
                    .as_mut()
                    .ok_or(TlsFormatError::OrphanRecord { line: line_num })?;
                for (tensor, index, value) in pairs {
                    group.set_component(tensor, &index, value);
                }
            }
        }

        if let Some(done) = current.take() {
            descriptions.push(done.finish()?);
        }
        Ok(descriptions)
    }

    fn write_to(
        descriptions: &[TlsGroupDescription],
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        writeln!(writer, "{RECORD_PREFIX}")?;
        writeln!(writer, "{RECORD_PREFIX}  TLS DEFINITIONS.")?;
        writeln!(
            writer,
            "{RECORD_PREFIX}   NUMBER OF TLS GROUPS  : {:>4}",
            descriptions.len()
        )?;

        for (i, desc) in descriptions.iter().enumerate() {
            let name = if desc.name.is_empty() {
                (i + 1).to_string()
            } else {
                desc.name.clone()
            };
            writeln!(writer, "{RECORD_PREFIX}")?;
            writeln!(writer, "{RECORD_PREFIX}   {GROUP_PREFIX} {name:>4}")?;
            writeln!(
                writer,
                "{RECORD_PREFIX}    NUMBER OF COMPONENTS GROUP : {:>4}",
                desc.ranges.len()
            )?;
            writeln!(
                writer,
                "{RECORD_PREFIX}    COMPONENTS        C SSSEQI   TO  C SSSEQI"
            )?;
            for range in &desc.ranges {
                writeln!(
                    writer,
                    "{RECORD_PREFIX}    {RANGE_PREFIX} {:>3} {:>5} {:>8} {:>5}",
                    range.chain_id, range.frag_id1, range.chain_id, range.frag_id2
                )?;
            }
            if let Some(o) = desc.origin {
                writeln!(
                    writer,
                    "{RECORD_PREFIX}    {ORIGIN_PREFIX} {:>8.4} {:>8.4} {:>8.4}",
                    o.x, o.y, o.z
                )?;
            }
            if let Some(t) = desc.t {
                writeln!(writer, "{RECORD_PREFIX}    T TENSOR")?;
                write_symmetric(writer, 'T', &t, 1.0)?;
            }
            if let Some(l) = desc.l {
                writeln!(writer, "{RECORD_PREFIX}    L TENSOR")?;
                write_symmetric(writer, 'L', &l, RAD2DEG2)?;
            }
            if let Some(s) = desc.s {
                writeln!(writer, "{RECORD_PREFIX}    S TENSOR")?;
                for row in 0..3 {
                    write!(writer, "{RECORD_PREFIX}")?;
                    for col in 0..3 {
                        write!(
                            writer,
                            "    S{}{}:{:>8.4}",
                            row + 1,
                            col + 1,
                            s[(row, col)] * RAD2DEG
                        )?;
                    }
                    writeln!(writer)?;
                }
            }
        }
        Ok(())
    }
}

fn write_symmetric(
    writer: &mut impl Write,
    tensor: char,
    m: &Matrix3<f64>,
    scale: f64,
) -> Result<(), TlsFormatError> {
    let pairs = [((0, 0), (1, 1)), ((2, 2), (0, 1)), ((0, 2), (1, 2))];
    for ((i1, j1), (i2, j2)) in pairs {
        writeln!(
            writer,
            "{RECORD_PREFIX}      {tensor}{}{}:{:>8.4} {tensor}{}{}:{:>8.4}",
            i1 + 1,
            j1 + 1,
            m[(i1, j1)] * scale,
            i2 + 1,
            j2 + 1,
            m[(i2, j2)] * scale
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tls::tensors::trace_free_s;
    use std::io::Cursor;

    const REFMAC_HEADER: &str = "\
REMARK   3  TLS DETAILS
REMARK   3   NUMBER OF TLS GROUPS  :    2
REMARK   3
REMARK   3   TLS GROUP :    1
REMARK   3    NUMBER OF COMPONENTS GROUP :    1
REMARK   3    COMPONENTS        C SSSEQI   TO  C SSSEQI
REMARK   3    RESIDUE RANGE :   A     1        A    95
REMARK   3    ORIGIN FOR THE GROUP (A):  17.4770  27.0537  11.6451
REMARK   3    T TENSOR
REMARK   3      T11:   0.1125 T22:   0.0910
REMARK   3      T33:   0.0802 T12:  -0.0046
REMARK   3      T13:   0.0101 T23:   0.0031
REMARK   3    L TENSOR
REMARK   3      L11:   1.2023 L22:   0.8704
REMARK   3      L33:   1.5219 L12:  -0.1177
REMARK   3      L13:   0.2030 L23:  -0.2414
REMARK   3    S TENSOR
REMARK   3      S11:   0.0129 S12:  -0.0377 S13:   0.0251
REMARK   3      S21:   0.0408 S22:  -0.0095 S23:  -0.0217
REMARK   3      S31:  -0.0333 S32:   0.0440 S33:  -0.0034
REMARK   3
REMARK   3   TLS GROUP :    2
REMARK   3    RESIDUE RANGE :   B    10        B    40
ATOM      1  N   MET A   1      16.000  27.000  11.000  1.00 20.00           N
";

    #[test]
    fn reads_refmac_header() {
        let groups = RemarkTlsFile::read_from(&mut Cursor::new(REFMAC_HEADER)).unwrap();
        assert_eq!(groups.len(), 2);

        let g = &groups[0];
        assert_eq!(g.name, "1");
        assert_eq!(g.ranges, vec![ResidueRange::new('A', "1", "95")]);
        assert_eq!(g.origin, Some(Point3::new(17.4770, 27.0537, 11.6451)));
        let t = g.t.unwrap();
        assert_eq!(t[(0, 1)], -0.0046);
        assert_eq!(t[(1, 0)], -0.0046);
        assert!((g.l.unwrap()[(2, 2)] * RAD2DEG2 - 1.5219).abs() < 1e-12);
        assert!((g.s.unwrap()[(2, 1)] * RAD2DEG - 0.0440).abs() < 1e-12);

        assert!(groups[1].is_null());
        assert_eq!(groups[1].ranges[0].frag_id1, "10");
    }

    #[test]
    fn write_then_read_preserves_groups() {
        let mut desc = TlsGroupDescription::new("1");
        desc.ranges.push(ResidueRange::new('C', "5", "88"));
        desc.origin = Some(Point3::new(-1.5, 2.25, 30.125));
        desc.t = Some(symmetric(0.05, 0.04, 0.03, 0.001, -0.002, 0.003));
        desc.l = Some(symmetric(0.002, 0.001, 0.0015, 0.0001, 0.0, -0.0002));
        desc.s = Some(trace_free_s(0.0003, -0.0001, 0.0002, 0.0, 0.0001, -0.0002, 0.0004, 0.0));

        let mut out = Vec::new();
        RemarkTlsFile::write_to(std::slice::from_ref(&desc), &mut out).unwrap();
        let loaded = RemarkTlsFile::read_from(&mut Cursor::new(out)).unwrap();

        assert_eq!(loaded.len(), 1);
        let b = &loaded[0];
        assert_eq!(b.ranges, desc.ranges);
        assert!((b.t.unwrap() - desc.t.unwrap()).abs().max() <= 5e-5);
        assert!((b.l.unwrap() - desc.l.unwrap()).abs().max() * RAD2DEG2 <= 5e-5);
        assert!((b.s.unwrap() - desc.s.unwrap()).abs().max() * RAD2DEG <= 5e-5);
    }

    #[test]
    fn partial_tensor_fails_the_load() {
        let input = "\
REMARK   3   TLS GROUP :    1
REMARK   3      T11:   0.1125 T22:   0.0910
REMARK   3   TLS GROUP :    2
";
        let err = RemarkTlsFile::read_from(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(
            err,
            TlsFormatError::IncompleteTensor { ref group, tensor: 'T' } if group == "1"
        ));
    }

    #[test]
    fn component_before_group_is_orphan() {
        let input = "REMARK   3      L11:   1.0 L22:   1.0\n";
        let err = RemarkTlsFile::read_from(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(err, TlsFormatError::OrphanRecord { line: 1 }));
    }

    #[test]
    fn unparsable_component_is_reported() {
        let input = "REMARK   3   TLS GROUP : 1\nREMARK   3      S11:  abc S12: 0.0\n";
        let err = RemarkTlsFile::read_from(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(
            err,
            TlsFormatError::Parse {
                line: 2,
                kind: TlsParseErrorKind::InvalidFloat { .. }
            }
        ));
    }

    #[test]
    fn labels_with_inline_values_are_split() {
        let pairs = labelled_values("T11:-0.0012 T22: 0.5 B11: 3.0", 1).unwrap();
        assert_eq!(
            pairs,
            vec![('T', "11".to_string(), -0.0012), ('T', "22".to_string(), 0.5)]
        );
    }
}
