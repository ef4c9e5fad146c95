use crate::core::io::traits::StructureFile;
use crate::core::models::elements;
use crate::core::models::structure::Structure;
use itertools::Itertools;
use nalgebra::{Matrix3, Point3, Vector3};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: XyzParseErrorKind,
    },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count (value: '{value}')")]
    InvalidAtomCount { value: String },
    #[error("File ended in the middle of a frame")]
    UnexpectedEof,
    #[error("Invalid float for {field} (value: '{value}')")]
    InvalidFloat {
        field: &'static str,
        value: String,
    },
    #[error("Invalid integer for {field} (value: '{value}')")]
    InvalidInt {
        field: &'static str,
        value: String,
    },
    #[error("Unknown element symbol '{symbol}'")]
    UnknownElement { symbol: String },
    #[error("Unsupported Properties spec '{spec}': {reason}")]
    BadProperties { spec: String, reason: &'static str },
    #[error("Lattice must hold nine floats (value: '{value}')")]
    BadLattice { value: String },
    #[error("pbc must hold three T/F flags (value: '{value}')")]
    BadPbc { value: String },
    #[error("Atom line has {found} columns, layout needs {expected}")]
    TooFewColumns { expected: usize, found: usize },
}

/// How the species column encodes identity: chemical symbols or raw atomic
/// numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpeciesStyle {
    Symbol,
    Number,
}

/// Column layout of a frame, derived from its `Properties` spec.
#[derive(Debug, Clone, PartialEq)]
struct ColumnLayout {
    species_col: usize,
    species_style: SpeciesStyle,
    pos_col: usize,
    forces_col: Option<usize>,
    total_cols: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            species_col: 0,
            species_style: SpeciesStyle::Symbol,
            pos_col: 1,
            forces_col: None,
            total_cols: 4,
        }
    }
}

/// Splits a comment line into fields, keeping quoted values intact.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

fn parse_properties(spec: &str, line: usize) -> Result<ColumnLayout, XyzError> {
    let bad = |reason: &'static str| XyzError::Parse {
        line,
        kind: XyzParseErrorKind::BadProperties {
            spec: spec.to_string(),
            reason,
        },
    };

    let parts: Vec<&str> = spec.split(':').collect();
    if parts.is_empty() || parts.len() % 3 != 0 {
        return Err(bad("expected name:type:count triplets"));
    }

    let mut species: Option<(usize, SpeciesStyle)> = None;
    let mut pos: Option<usize> = None;
    let mut forces: Option<usize> = None;
    let mut col = 0;

    for (name, kind, count) in parts.iter().copied().tuples() {
        let count: usize = count
            .parse()
            .map_err(|_| bad("column count is not an integer"))?;
        match name {
            "species" => {
                let style = match kind {
                    "S" => SpeciesStyle::Symbol,
                    "I" => SpeciesStyle::Number,
                    _ => return Err(bad("species must be S or I")),
                };
                if count != 1 {
                    return Err(bad("species must span one column"));
                }
                species = Some((col, style));
            }
            "pos" => {
                if kind != "R" || count != 3 {
                    return Err(bad("pos must be R:3"));
                }
                pos = Some(col);
            }
            "forces" | "force" => {
                if kind != "R" || count != 3 {
                    return Err(bad("forces must be R:3"));
                }
                forces = Some(col);
            }
            // Extra per-atom columns are carried by some generators; they
            // are skipped but still count toward the layout width.
            _ => {}
        }
        col += count;
    }

    let (species_col, species_style) = species.ok_or_else(|| bad("species column missing"))?;
    let pos_col = pos.ok_or_else(|| bad("pos column missing"))?;
    Ok(ColumnLayout {
        species_col,
        species_style,
        pos_col,
        forces_col: forces,
        total_cols: col,
    })
}

fn parse_lattice(value: &str, line: usize) -> Result<Matrix3<f64>, XyzError> {
    let floats: Result<Vec<f64>, _> = value.split_whitespace().map(str::parse).collect();
    match floats {
        Ok(v) if v.len() == 9 => Ok(Matrix3::new(
            v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8],
        )),
        _ => Err(XyzError::Parse {
            line,
            kind: XyzParseErrorKind::BadLattice {
                value: value.to_string(),
            },
        }),
    }
}

fn parse_pbc(value: &str, line: usize) -> Result<[bool; 3], XyzError> {
    let flags: Vec<&str> = value.split_whitespace().collect();
    let parse_flag = |f: &str| match f {
        "T" | "True" | "true" => Some(true),
        "F" | "False" | "false" => Some(false),
        _ => None,
    };
    if flags.len() == 3 {
        if let (Some(a), Some(b), Some(c)) = (
            parse_flag(flags[0]),
            parse_flag(flags[1]),
            parse_flag(flags[2]),
        ) {
            return Ok([a, b, c]);
        }
    }
    Err(XyzError::Parse {
        line,
        kind: XyzParseErrorKind::BadPbc {
            value: value.to_string(),
        },
    })
}

fn parse_species(token: &str, style: SpeciesStyle, line: usize) -> Result<u32, XyzError> {
    match style {
        SpeciesStyle::Symbol => {
            elements::atomic_number(token).ok_or_else(|| XyzError::Parse {
                line,
                kind: XyzParseErrorKind::UnknownElement {
                    symbol: token.to_string(),
                },
            })
        }
        SpeciesStyle::Number => token.parse().map_err(|_| XyzError::Parse {
            line,
            kind: XyzParseErrorKind::InvalidInt {
                field: "species",
                value: token.to_string(),
            },
        }),
    }
}

fn parse_float(token: &str, field: &'static str, line: usize) -> Result<f64, XyzError> {
    token.parse().map_err(|_| XyzError::Parse {
        line,
        kind: XyzParseErrorKind::InvalidFloat {
            field,
            value: token.to_string(),
        },
    })
}

/// Multi-frame extended-XYZ files.
///
/// The comment line of each frame may carry `Lattice`, `Properties`,
/// `energy` and `pbc` key=value entries; per-atom columns follow the
/// `Properties` spec (default `species:S:1:pos:R:3`).
pub struct ExtXyzFile;

impl StructureFile for ExtXyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error> {
        let mut structures = Vec::new();
        let mut lines = reader.lines().enumerate();

        loop {
            // Skip blank lines between frames; a clean EOF here ends the file.
            let (count_line_num, count_line) = loop {
                match lines.next() {
                    None => return Ok(structures),
                    Some((i, line)) => {
                        let line = line?;
                        if !line.trim().is_empty() {
                            break (i + 1, line);
                        }
                    }
                }
            };

            let n_atoms: usize =
                count_line
                    .trim()
                    .parse()
                    .map_err(|_| XyzError::Parse {
                        line: count_line_num,
                        kind: XyzParseErrorKind::InvalidAtomCount {
                            value: count_line.trim().to_string(),
                        },
                    })?;

            let (comment_line_num, comment) = match lines.next() {
                None => {
                    return Err(XyzError::Parse {
                        line: count_line_num,
                        kind: XyzParseErrorKind::UnexpectedEof,
                    });
                }
                Some((i, line)) => (i + 1, line?),
            };

            let mut layout = ColumnLayout::default();
            let mut cell = None;
            let mut pbc = None;
            let mut energy = None;

            for field in split_fields(&comment) {
                let Some((key, value)) = field.split_once('=') else {
                    continue;
                };
                match key.to_ascii_lowercase().as_str() {
                    "lattice" => cell = Some(parse_lattice(value, comment_line_num)?),
                    "properties" => layout = parse_properties(value, comment_line_num)?,
                    "energy" => {
                        energy = Some(parse_float(value, "energy", comment_line_num)?);
                    }
                    "pbc" => pbc = Some(parse_pbc(value, comment_line_num)?),
                    _ => {}
                }
            }

            let pbc = match (pbc, &cell) {
                (Some(p), _) => p,
                (None, Some(_)) => [true; 3],
                (None, None) => [false; 3],
            };

            let mut atomic_numbers = Vec::with_capacity(n_atoms);
            let mut positions = Vec::with_capacity(n_atoms);
            let mut forces = layout.forces_col.map(|_| Vec::with_capacity(n_atoms));

            for _ in 0..n_atoms {
                let (atom_line_num, atom_line) = match lines.next() {
                    None => {
                        return Err(XyzError::Parse {
                            line: comment_line_num,
                            kind: XyzParseErrorKind::UnexpectedEof,
                        });
                    }
                    Some((i, line)) => (i + 1, line?),
                };

                let cols: Vec<&str> = atom_line.split_whitespace().collect();
                if cols.len() < layout.total_cols {
                    return Err(XyzError::Parse {
                        line: atom_line_num,
                        kind: XyzParseErrorKind::TooFewColumns {
                            expected: layout.total_cols,
                            found: cols.len(),
                        },
                    });
                }

                atomic_numbers.push(parse_species(
                    cols[layout.species_col],
                    layout.species_style,
                    atom_line_num,
                )?);

                let p = layout.pos_col;
                positions.push(Point3::new(
                    parse_float(cols[p], "pos", atom_line_num)?,
                    parse_float(cols[p + 1], "pos", atom_line_num)?,
                    parse_float(cols[p + 2], "pos", atom_line_num)?,
                ));

                if let (Some(f), Some(store)) = (layout.forces_col, forces.as_mut()) {
                    store.push(Vector3::new(
                        parse_float(cols[f], "forces", atom_line_num)?,
                        parse_float(cols[f + 1], "forces", atom_line_num)?,
                        parse_float(cols[f + 2], "forces", atom_line_num)?,
                    ));
                }
            }

            structures.push(Structure {
                atomic_numbers,
                positions,
                cell,
                pbc,
                energy,
                forces,
            });
        }
    }

    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), Self::Error> {
        for structure in structures {
            writeln!(writer, "{}", structure.len())?;

            let mut comment = String::new();
            if let Some(cell) = &structure.cell {
                comment.push_str("Lattice=\"");
                for row in 0..3 {
                    for col in 0..3 {
                        if row + col > 0 {
                            comment.push(' ');
                        }
                        comment.push_str(&format!("{}", cell[(row, col)]));
                    }
                }
                comment.push_str("\" ");
            }
            comment.push_str("Properties=species:S:1:pos:R:3");
            if structure.forces.is_some() {
                comment.push_str(":forces:R:3");
            }
            if let Some(energy) = structure.energy {
                comment.push_str(&format!(" energy={}", energy));
            }
            if structure.cell.is_some() {
                let flag = |p: bool| if p { "T" } else { "F" };
                comment.push_str(&format!(
                    " pbc=\"{} {} {}\"",
                    flag(structure.pbc[0]),
                    flag(structure.pbc[1]),
                    flag(structure.pbc[2])
                ));
            }
            writeln!(writer, "{}", comment)?;

            for (i, (&z, pos)) in structure
                .atomic_numbers
                .iter()
                .zip(&structure.positions)
                .enumerate()
            {
                let symbol = elements::symbol(z).ok_or_else(|| {
                    XyzError::Inconsistency(format!("no symbol for atomic number {}", z))
                })?;
                write!(writer, "{} {} {} {}", symbol, pos.x, pos.y, pos.z)?;
                if let Some(forces) = &structure.forces {
                    let f = forces[i];
                    write!(writer, " {} {} {}", f.x, f.y, f.z)?;
                }
                writeln!(writer)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn read_str(content: &str) -> Result<Vec<Structure>, XyzError> {
        ExtXyzFile::read_from(&mut BufReader::new(content.as_bytes()))
    }

    #[test]
    fn reads_plain_xyz_with_default_layout() {
        let content = "3\nwater molecule\nO 0.0 0.0 0.0\nH 0.96 0.0 0.0\nH -0.24 0.93 0.0\n";
        let structures = read_str(content).unwrap();
        assert_eq!(structures.len(), 1);
        let s = &structures[0];
        assert_eq!(s.atomic_numbers, vec![8, 1, 1]);
        assert_eq!(s.positions[1], Point3::new(0.96, 0.0, 0.0));
        assert!(s.cell.is_none());
        assert!(s.energy.is_none());
    }

    #[test]
    fn reads_extended_frame_with_lattice_energy_and_forces() {
        let content = concat!(
            "2\n",
            "Lattice=\"10 0 0 0 10 0 0 0 10\" ",
            "Properties=species:S:1:pos:R:3:forces:R:3 energy=-5.25 pbc=\"T T F\"\n",
            "Si 0.0 0.0 0.0 0.1 -0.2 0.3\n",
            "Si 1.35 1.35 1.35 -0.1 0.2 -0.3\n",
        );
        let structures = read_str(content).unwrap();
        let s = &structures[0];
        assert_eq!(s.atomic_numbers, vec![14, 14]);
        assert_eq!(s.energy, Some(-5.25));
        assert_eq!(s.pbc, [true, true, false]);
        let cell = s.cell.unwrap();
        assert_eq!(cell[(0, 0)], 10.0);
        assert_eq!(cell[(2, 2)], 10.0);
        let forces = s.forces.as_ref().unwrap();
        assert_eq!(forces[0], Vector3::new(0.1, -0.2, 0.3));
    }

    #[test]
    fn reads_multiple_frames_and_skips_blank_lines() {
        let content = "1\nframe one\nH 0 0 0\n\n1\nframe two energy=1.5\nHe 1 1 1\n";
        let structures = read_str(content).unwrap();
        assert_eq!(structures.len(), 2);
        assert_eq!(structures[1].atomic_numbers, vec![2]);
        assert_eq!(structures[1].energy, Some(1.5));
    }

    #[test]
    fn numeric_species_column_is_supported() {
        let content = "1\nProperties=species:I:1:pos:R:3\n26 0 0 0\n";
        let structures = read_str(content).unwrap();
        assert_eq!(structures[0].atomic_numbers, vec![26]);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let content = "3\ncomment\nH 0 0 0\n";
        let err = read_str(content).unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                kind: XyzParseErrorKind::UnexpectedEof,
                ..
            }
        ));
    }

    #[test]
    fn unknown_element_reports_its_line() {
        let content = "1\ncomment\nQq 0 0 0\n";
        let err = read_str(content).unwrap_err();
        match err {
            XyzError::Parse {
                line,
                kind: XyzParseErrorKind::UnknownElement { symbol },
            } => {
                assert_eq!(line, 3);
                assert_eq!(symbol, "Qq");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn bad_lattice_is_an_error() {
        let content = "1\nLattice=\"10 0 0\"\nH 0 0 0\n";
        let err = read_str(content).unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                kind: XyzParseErrorKind::BadLattice { .. },
                ..
            }
        ));
    }

    #[test]
    fn round_trip_preserves_frame_contents() {
        let content = concat!(
            "2\n",
            "Lattice=\"6.1 0 0 0 6.2 0 0 0 6.3\" ",
            "Properties=species:S:1:pos:R:3:forces:R:3 energy=-1.75 pbc=\"T T T\"\n",
            "O 0.5 0.25 0.125 1.5 0 -2.25\n",
            "H 1.5 0.25 0.125 -1.5 0 2.25\n",
        );
        let original = read_str(content).unwrap();
        let mut buffer = Vec::new();
        ExtXyzFile::write_to(&original, &mut buffer).unwrap();
        let reread =
            ExtXyzFile::read_from(&mut BufReader::new(buffer.as_slice())).unwrap();
        assert_eq!(original, reread);
    }
}
