//! NumPy `.npy` encoding.
//!
//! Arrays are written little-endian in C order. The header is a Python
//! dict literal padded with spaces so the data starts on a 64-byte
//! boundary; version 2.0 is used only when the header would not fit the
//! 16-bit length field of version 1.0.

use super::StoreError;
use crate::assembly::OutputArray;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

/// Element type of a stored array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    /// `complex128`, real part first.
    Complex128,
    /// `float64`.
    Float64,
    /// `datetime64[ns]`, nanoseconds since the Unix epoch.
    DatetimeNs,
}

impl Dtype {
    /// Returns the dtype of an output array.
    pub fn of(array: &OutputArray) -> Self {
        match array {
            OutputArray::Complex(_) => Dtype::Complex128,
            OutputArray::Real(_) => Dtype::Float64,
            OutputArray::Timestamp(_) => Dtype::DatetimeNs,
        }
    }

    /// Returns the NumPy type descriptor.
    pub fn descr(&self) -> &'static str {
        match self {
            Dtype::Complex128 => "<c16",
            Dtype::Float64 => "<f8",
            Dtype::DatetimeNs => "<M8[ns]",
        }
    }

    /// Returns the element size in bytes.
    pub fn item_size(&self) -> usize {
        match self {
            Dtype::Complex128 => 16,
            Dtype::Float64 | Dtype::DatetimeNs => 8,
        }
    }
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let dims: Vec<String> = dims.iter().map(ToString::to_string).collect();
            format!("({})", dims.join(", "))
        }
    }
}

/// Encodes the magic string, version, header length and padded header.
pub fn encode_header(dtype: Dtype, shape: &[usize]) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        dtype.descr(),
        shape_literal(shape)
    );

    // Magic, version and length field, then the dict and a trailing newline.
    let mut prefix = MAGIC.len() + 2 + 2;
    let mut version = 1u8;
    if (prefix + dict.len() + 1).next_multiple_of(ALIGNMENT) - prefix > u16::MAX as usize {
        prefix += 2;
        version = 2;
    }
    let total = (prefix + dict.len() + 1).next_multiple_of(ALIGNMENT);
    let header_len = total - prefix;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[version, 0]);
    if version == 1 {
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
    } else {
        out.extend_from_slice(&(header_len as u32).to_le_bytes());
    }
    out.extend_from_slice(dict.as_bytes());
    out.resize(total - 1, b' ');
    out.push(b'\n');
    out
}

/// Writes one array in `.npy` format, returning the number of bytes written.
pub fn write_array<W: Write>(out: &mut W, array: &OutputArray) -> std::io::Result<u64> {
    let header = encode_header(Dtype::of(array), array.shape());
    out.write_all(&header)?;

    match array {
        OutputArray::Complex(values) => {
            for value in values.iter() {
                out.write_all(&value.re.to_le_bytes())?;
                out.write_all(&value.im.to_le_bytes())?;
            }
        }
        OutputArray::Real(values) => {
            for value in values.iter() {
                out.write_all(&value.to_le_bytes())?;
            }
        }
        OutputArray::Timestamp(values) => {
            for value in values.iter() {
                out.write_all(&value.to_le_bytes())?;
            }
        }
    }

    let data = array.len() * Dtype::of(array).item_size();
    Ok((header.len() + data) as u64)
}

/// Parsed `.npy` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    /// Format major version.
    pub version: u8,
    /// Type descriptor, e.g. `<f8`.
    pub descr: String,
    /// Whether the data is in Fortran order.
    pub fortran_order: bool,
    /// Array shape.
    pub shape: Vec<usize>,
    /// Byte offset of the first element.
    pub data_offset: usize,
}

impl NpyHeader {
    /// Reads the header of a `.npy` file.
    pub fn read_file(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        Self::read_from(&mut BufReader::new(file))
    }

    /// Reads a header from the start of a `.npy` stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, StoreError> {
        let mut preamble = [0u8; 8];
        reader.read_exact(&mut preamble)?;
        if &preamble[..6] != MAGIC {
            return Err(StoreError::Format("missing .npy magic".into()));
        }

        let version = preamble[6];
        let (header_len, prefix) = match version {
            1 => {
                let mut len = [0u8; 2];
                reader.read_exact(&mut len)?;
                (u16::from_le_bytes(len) as usize, 10)
            }
            2 | 3 => {
                let mut len = [0u8; 4];
                reader.read_exact(&mut len)?;
                (u32::from_le_bytes(len) as usize, 12)
            }
            other => {
                return Err(StoreError::Format(format!(
                    "unsupported .npy version {other}"
                )))
            }
        };

        let mut raw = vec![0u8; header_len];
        reader.read_exact(&mut raw)?;
        let dict = std::str::from_utf8(&raw)
            .map_err(|_| StoreError::Format("non-UTF8 header".into()))?;

        Ok(Self {
            version,
            descr: extract_field(dict, "descr")?,
            fortran_order: extract_field(dict, "fortran_order")?.contains("True"),
            shape: parse_shape(dict)?,
            data_offset: prefix + header_len,
        })
    }
}

fn extract_field(dict: &str, field: &str) -> Result<String, StoreError> {
    let key = format!("'{field}':");
    let start = dict
        .find(&key)
        .ok_or_else(|| StoreError::Format(format!("field '{field}' not found")))?;
    let rest = &dict[start + key.len()..];
    let end = rest.find(',').or_else(|| rest.find('}')).unwrap_or(rest.len());
    Ok(rest[..end].trim().trim_matches('\'').to_string())
}

fn parse_shape(dict: &str) -> Result<Vec<usize>, StoreError> {
    let start = dict
        .find("'shape':")
        .ok_or_else(|| StoreError::Format("field 'shape' not found".into()))?;
    let rest = &dict[start..];
    let open = rest
        .find('(')
        .ok_or_else(|| StoreError::Format("shape is not a tuple".into()))?;
    let close = rest[open..]
        .find(')')
        .ok_or_else(|| StoreError::Format("unterminated shape tuple".into()))?;

    rest[open + 1..open + close]
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| StoreError::Format(format!("bad dimension '{dim}'")))
        })
        .collect()
}
