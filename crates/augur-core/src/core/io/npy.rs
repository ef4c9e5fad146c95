use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not an NPY file (bad magic)")]
    BadMagic,
    #[error("Unsupported NPY format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("Malformed NPY header: {0}")]
    BadHeader(String),
    #[error("Unsupported dtype '{0}' (expected little-endian integers or floats)")]
    UnsupportedDtype(String),
    #[error("Expected a 1-D array, found shape ({0})")]
    NotOneDimensional(String),
    #[error("Data section is truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
}

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Parsed header of an NPY array: dtype descriptor and 1-D length.
#[derive(Debug, PartialEq, Eq)]
struct NpyHeader {
    descr: String,
    len: usize,
}

fn extract_quoted(header: &str, key: &str) -> Result<String, NpyError> {
    let key_pattern = format!("'{}'", key);
    let start = header
        .find(&key_pattern)
        .ok_or_else(|| NpyError::BadHeader(format!("missing key '{}'", key)))?;
    let rest = &header[start + key_pattern.len()..];
    let rest = rest
        .trim_start()
        .strip_prefix(':')
        .ok_or_else(|| NpyError::BadHeader(format!("no value for '{}'", key)))?
        .trim_start();
    let rest = rest
        .strip_prefix('\'')
        .ok_or_else(|| NpyError::BadHeader(format!("value of '{}' is not quoted", key)))?;
    let end = rest
        .find('\'')
        .ok_or_else(|| NpyError::BadHeader(format!("unterminated value for '{}'", key)))?;
    Ok(rest[..end].to_string())
}

fn extract_shape(header: &str) -> Result<String, NpyError> {
    let start = header
        .find("'shape'")
        .ok_or_else(|| NpyError::BadHeader("missing key 'shape'".to_string()))?;
    let rest = &header[start..];
    let open = rest
        .find('(')
        .ok_or_else(|| NpyError::BadHeader("shape tuple not found".to_string()))?;
    let close = rest[open..]
        .find(')')
        .ok_or_else(|| NpyError::BadHeader("unterminated shape tuple".to_string()))?;
    Ok(rest[open + 1..open + close].to_string())
}

fn read_header(reader: &mut impl Read) -> Result<NpyHeader, NpyError> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(NpyError::BadMagic);
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        _ => {
            return Err(NpyError::UnsupportedVersion {
                major: version[0],
                minor: version[1],
            });
        }
    };

    let mut header_bytes = vec![0u8; header_len];
    reader.read_exact(&mut header_bytes)?;
    let header = String::from_utf8(header_bytes)
        .map_err(|_| NpyError::BadHeader("header is not UTF-8".to_string()))?;

    let descr = extract_quoted(&header, "descr")?;
    if header.contains("'fortran_order': True") {
        // Irrelevant for 1-D data but a marker of something unexpected.
        return Err(NpyError::BadHeader(
            "fortran_order arrays are not supported".to_string(),
        ));
    }

    let shape = extract_shape(&header)?;
    let dims: Vec<&str> = shape
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if dims.len() != 1 {
        return Err(NpyError::NotOneDimensional(shape));
    }
    let len: usize = dims[0]
        .parse()
        .map_err(|_| NpyError::BadHeader(format!("bad shape entry '{}'", dims[0])))?;

    Ok(NpyHeader { descr, len })
}

fn read_data(reader: &mut impl Read, expected: usize) -> Result<Vec<u8>, NpyError> {
    let mut data = Vec::with_capacity(expected);
    reader.read_to_end(&mut data)?;
    if data.len() < expected {
        return Err(NpyError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    Ok(data)
}

/// Reads a 1-D integer array (`<i4` or `<i8`).
pub fn read_i64_1d(reader: &mut impl Read) -> Result<Vec<i64>, NpyError> {
    let header = read_header(reader)?;
    match header.descr.as_str() {
        "<i8" => {
            let data = read_data(reader, header.len * 8)?;
            Ok(data
                .chunks_exact(8)
                .take(header.len)
                .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
                .collect())
        }
        "<i4" => {
            let data = read_data(reader, header.len * 4)?;
            Ok(data
                .chunks_exact(4)
                .take(header.len)
                .map(|b| i32::from_le_bytes(b.try_into().unwrap()) as i64)
                .collect())
        }
        other => Err(NpyError::UnsupportedDtype(other.to_string())),
    }
}

/// Reads a 1-D float array (`<f8`, or `<f4` widened to f64).
pub fn read_f64_1d(reader: &mut impl Read) -> Result<Vec<f64>, NpyError> {
    let header = read_header(reader)?;
    match header.descr.as_str() {
        "<f8" => {
            let data = read_data(reader, header.len * 8)?;
            Ok(data
                .chunks_exact(8)
                .take(header.len)
                .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
                .collect())
        }
        "<f4" => {
            let data = read_data(reader, header.len * 4)?;
            Ok(data
                .chunks_exact(4)
                .take(header.len)
                .map(|b| f32::from_le_bytes(b.try_into().unwrap()) as f64)
                .collect())
        }
        other => Err(NpyError::UnsupportedDtype(other.to_string())),
    }
}

pub fn read_i64_1d_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<i64>, NpyError> {
    let file = File::open(path)?;
    read_i64_1d(&mut BufReader::new(file))
}

pub fn read_f64_1d_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<f64>, NpyError> {
    let file = File::open(path)?;
    read_f64_1d(&mut BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serializes a v1.0 NPY file the way `np.save` lays it out.
    fn npy_bytes(descr: &str, shape: &str, data: &[u8]) -> Vec<u8> {
        let mut header = format!(
            "{{'descr': '{}', 'fortran_order': False, 'shape': ({}), }}",
            descr, shape
        );
        let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
        let padding = (64 - unpadded % 64) % 64;
        header.push_str(&" ".repeat(padding));
        header.push('\n');

        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn reads_f8_array() {
        let values = [-1.5f64, 0.0, 2.25];
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = npy_bytes("<f8", "3,", &data);
        let parsed = read_f64_1d(&mut bytes.as_slice()).unwrap();
        assert_eq!(parsed, values);
    }

    #[test]
    fn reads_i8_array() {
        let values = [1i64, 6, 8, 14];
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = npy_bytes("<i8", "4,", &data);
        let parsed = read_i64_1d(&mut bytes.as_slice()).unwrap();
        assert_eq!(parsed, values);
    }

    #[test]
    fn widens_i4_to_i64() {
        let values = [1i32, 22, -7];
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = npy_bytes("<i4", "3,", &data);
        let parsed = read_i64_1d(&mut bytes.as_slice()).unwrap();
        assert_eq!(parsed, vec![1, 22, -7]);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = b"NOTNPY\x01\x00".to_vec();
        assert!(matches!(
            read_f64_1d(&mut bytes.as_slice()),
            Err(NpyError::BadMagic)
        ));
    }

    #[test]
    fn rejects_two_dimensional_arrays() {
        let bytes = npy_bytes("<f8", "2, 3", &[0u8; 48]);
        assert!(matches!(
            read_f64_1d(&mut bytes.as_slice()),
            Err(NpyError::NotOneDimensional(_))
        ));
    }

    #[test]
    fn rejects_mismatched_dtype() {
        let bytes = npy_bytes("<f8", "1,", &[0u8; 8]);
        assert!(matches!(
            read_i64_1d(&mut bytes.as_slice()),
            Err(NpyError::UnsupportedDtype(_))
        ));
    }

    #[test]
    fn reports_truncated_data() {
        let bytes = npy_bytes("<f8", "4,", &[0u8; 16]);
        match read_f64_1d(&mut bytes.as_slice()) {
            Err(NpyError::Truncated { expected, actual }) => {
                assert_eq!(expected, 32);
                assert_eq!(actual, 16);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
