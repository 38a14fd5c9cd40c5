//! Compressed named-array archives
//!
//! An archive holds an ordered set of named, shaped `f32`/`f64` arrays and is
//! stored as a gzip stream. Values are written little-endian, so a round trip
//! reproduces every array bit for bit, and identical archives always encode to
//! identical bytes.
//!
//! Layout of the decompressed stream:
//!
//! ```text
//! magic "SPLATARC" | version u16 | array count u32
//! per array: name len u16 | name utf-8 | dtype u8 | ndim u8 | dims u64[ndim] | data
//! ```

use crate::fs::write_atomic;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const MAGIC: &[u8; 8] = b"SPLATARC";
const VERSION: u16 = 1;

/// Errors raised by archive encoding, decoding and lookup.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("not an array archive (bad magic)")]
    BadMagic,
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u16),
    #[error("array '{name}' has {actual} values but shape {shape:?} needs {expected}")]
    ShapeMismatch {
        name: String,
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate array '{0}'")]
    DuplicateName(String),
    #[error("array '{0}' not found")]
    MissingArray(String),
    #[error("array '{name}' is {found}, expected {expected}")]
    DtypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("corrupt archive: {0}")]
    Corrupt(String),
}

/// Typed array payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ArrayData {
    fn tag(&self) -> u8 {
        match self {
            Self::F32(_) => 0,
            Self::F64(_) => 1,
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One named array with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArray {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: ArrayData,
}

/// An ordered collection of named arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayArchive {
    arrays: Vec<NamedArray>,
}

impl ArrayArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an array. The shape must account for exactly `data.len()` values.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        shape: &[usize],
        data: ArrayData,
    ) -> Result<(), ArchiveError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ArchiveError::DuplicateName(name));
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ArchiveError::ShapeMismatch {
                name,
                shape: shape.to_vec(),
                expected,
                actual: data.len(),
            });
        }
        self.arrays.push(NamedArray {
            name,
            shape: shape.to_vec(),
            data,
        });
        Ok(())
    }

    pub fn insert_f32(
        &mut self,
        name: impl Into<String>,
        shape: &[usize],
        data: Vec<f32>,
    ) -> Result<(), ArchiveError> {
        self.insert(name, shape, ArrayData::F32(data))
    }

    pub fn insert_f64(
        &mut self,
        name: impl Into<String>,
        shape: &[usize],
        data: Vec<f64>,
    ) -> Result<(), ArchiveError> {
        self.insert(name, shape, ArrayData::F64(data))
    }

    pub fn get(&self, name: &str) -> Option<&NamedArray> {
        self.arrays.iter().find(|a| a.name == name)
    }

    fn require(&self, name: &str) -> Result<&NamedArray, ArchiveError> {
        self.get(name)
            .ok_or_else(|| ArchiveError::MissingArray(name.to_string()))
    }

    /// Shape and values of an `f32` array.
    pub fn f32_array(&self, name: &str) -> Result<(&[usize], &[f32]), ArchiveError> {
        let array = self.require(name)?;
        match &array.data {
            ArrayData::F32(values) => Ok((&array.shape, values)),
            other => Err(ArchiveError::DtypeMismatch {
                name: name.to_string(),
                expected: "float32",
                found: other.dtype(),
            }),
        }
    }

    /// Shape and values of an `f64` array.
    pub fn f64_array(&self, name: &str) -> Result<(&[usize], &[f64]), ArchiveError> {
        let array = self.require(name)?;
        match &array.data {
            ArrayData::F64(values) => Ok((&array.shape, values)),
            other => Err(ArchiveError::DtypeMismatch {
                name: name.to_string(),
                expected: "float64",
                found: other.dtype(),
            }),
        }
    }

    /// Values of any floating array widened to `f64`.
    pub fn to_f64_vec(&self, name: &str) -> Result<Vec<f64>, ArchiveError> {
        Ok(match &self.require(name)?.data {
            ArrayData::F32(values) => values.iter().map(|&v| v as f64).collect(),
            ArrayData::F64(values) => values.clone(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Encode the archive (gzip compressed) into `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), ArchiveError> {
        let mut out = GzEncoder::new(writer, Compression::default());
        out.write_all(MAGIC)?;
        out.write_u16::<LittleEndian>(VERSION)?;
        out.write_u32::<LittleEndian>(self.arrays.len() as u32)?;

        for array in &self.arrays {
            let name = array.name.as_bytes();
            let name_len = u16::try_from(name.len())
                .map_err(|_| ArchiveError::Corrupt(format!("array name too long: {}", array.name)))?;
            out.write_u16::<LittleEndian>(name_len)?;
            out.write_all(name)?;
            out.write_u8(array.data.tag())?;
            out.write_u8(array.shape.len() as u8)?;
            for &dim in &array.shape {
                out.write_u64::<LittleEndian>(dim as u64)?;
            }
            match &array.data {
                ArrayData::F32(values) => {
                    for &v in values {
                        out.write_f32::<LittleEndian>(v)?;
                    }
                }
                ArrayData::F64(values) => {
                    for &v in values {
                        out.write_f64::<LittleEndian>(v)?;
                    }
                }
            }
        }

        out.finish()?;
        Ok(())
    }

    /// Decode an archive from a gzip stream.
    pub fn read_from<R: Read>(reader: R) -> Result<Self, ArchiveError> {
        let mut input = GzDecoder::new(reader);
        let mut magic = [0u8; 8];
        input.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ArchiveError::BadMagic);
        }
        let version = input.read_u16::<LittleEndian>()?;
        if version != VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }

        let count = input.read_u32::<LittleEndian>()?;
        let mut archive = Self::new();
        for _ in 0..count {
            let name_len = input.read_u16::<LittleEndian>()? as usize;
            let mut name = vec![0u8; name_len];
            input.read_exact(&mut name)?;
            let name = String::from_utf8(name)
                .map_err(|_| ArchiveError::Corrupt("array name is not utf-8".into()))?;

            let tag = input.read_u8()?;
            let ndim = input.read_u8()? as usize;
            let mut shape = Vec::with_capacity(ndim);
            for _ in 0..ndim {
                shape.push(input.read_u64::<LittleEndian>()? as usize);
            }
            let len = shape
                .iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                .ok_or_else(|| ArchiveError::Corrupt(format!("array '{name}' is too large")))?;

            let data = match tag {
                0 => {
                    let bytes = read_payload(&mut input, &name, len, 4)?;
                    let mut values = vec![0f32; len];
                    LittleEndian::read_f32_into(&bytes, &mut values);
                    ArrayData::F32(values)
                }
                1 => {
                    let bytes = read_payload(&mut input, &name, len, 8)?;
                    let mut values = vec![0f64; len];
                    LittleEndian::read_f64_into(&bytes, &mut values);
                    ArrayData::F64(values)
                }
                other => {
                    return Err(ArchiveError::Corrupt(format!(
                        "array '{name}' has unknown dtype tag {other}"
                    )));
                }
            };
            archive.insert(name, &shape, data)?;
        }
        Ok(archive)
    }

    /// Write the archive to `path` atomically.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArchiveError> {
        let mut encoded = Vec::new();
        self.write_to(&mut encoded)?;
        write_atomic(path.as_ref(), |w| w.write_all(&encoded))?;
        debug!("Saved {} arrays ({} bytes)", self.arrays.len(), encoded.len());
        Ok(())
    }

    /// Read an archive from `path`.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let file = File::open(path.as_ref())?;
        let archive = Self::read_from(BufReader::new(file))?;
        debug!("Loaded {} arrays", archive.len());
        Ok(archive)
    }
}

/// Read the raw bytes of `len` values of `width` bytes each.
///
/// The buffer grows with the data actually present, so a corrupt shape fails
/// as truncated instead of allocating up front.
fn read_payload<R: Read>(
    input: &mut R,
    name: &str,
    len: usize,
    width: usize,
) -> Result<Vec<u8>, ArchiveError> {
    let size = len
        .checked_mul(width)
        .filter(|&size| size <= isize::MAX as usize)
        .ok_or_else(|| ArchiveError::Corrupt(format!("array '{name}' is too large")))?;
    let mut bytes = Vec::new();
    input.by_ref().take(size as u64).read_to_end(&mut bytes)?;
    if bytes.len() != size {
        return Err(ArchiveError::Corrupt(format!(
            "array '{name}' is truncated: {} of {size} bytes",
            bytes.len()
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArrayArchive {
        let mut archive = ArrayArchive::new();
        archive
            .insert_f32("means", &[2, 3], vec![0.1, -2.5, 3.0, f32::MIN_POSITIVE, 1e30, -0.0])
            .unwrap();
        archive
            .insert_f64("scales", &[2], vec![std::f64::consts::PI, 1e-300])
            .unwrap();
        archive
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let archive = sample();
        let mut bytes = Vec::new();
        archive.write_to(&mut bytes).unwrap();
        let decoded = ArrayArchive::read_from(bytes.as_slice()).unwrap();

        let (shape, means) = decoded.f32_array("means").unwrap();
        assert_eq!(shape, &[2, 3]);
        let (_, original) = archive.f32_array("means").unwrap();
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(means), bits(original));
        assert_eq!(decoded, archive);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        sample().write_to(&mut a).unwrap();
        sample().write_to(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shape_must_match_data() {
        let mut archive = ArrayArchive::new();
        let err = archive.insert_f32("x", &[2, 2], vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, ArchiveError::ShapeMismatch { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut archive = sample();
        assert!(matches!(
            archive.insert_f64("scales", &[0], vec![]),
            Err(ArchiveError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_dtype_lookup() {
        let archive = sample();
        assert!(matches!(
            archive.f64_array("means"),
            Err(ArchiveError::DtypeMismatch { .. })
        ));
        assert!(matches!(
            archive.f32_array("missing"),
            Err(ArchiveError::MissingArray(_))
        ));
        assert_eq!(archive.to_f64_vec("means").unwrap()[0], 0.1f32 as f64);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = Vec::new();
        let mut enc = GzEncoder::new(&mut bytes, Compression::default());
        enc.write_all(b"NOTANARCHIVE").unwrap();
        enc.finish().unwrap();
        assert!(matches!(
            ArrayArchive::read_from(bytes.as_slice()),
            Err(ArchiveError::BadMagic)
        ));
    }

    fn header_with_dim(dim: u64) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut enc = GzEncoder::new(&mut bytes, Compression::default());
        enc.write_all(MAGIC).unwrap();
        enc.write_u16::<LittleEndian>(VERSION).unwrap();
        enc.write_u32::<LittleEndian>(1).unwrap();
        enc.write_u16::<LittleEndian>(6).unwrap();
        enc.write_all(b"scales").unwrap();
        enc.write_u8(1).unwrap();
        enc.write_u8(1).unwrap();
        enc.write_u64::<LittleEndian>(dim).unwrap();
        enc.write_f64::<LittleEndian>(0.5).unwrap();
        enc.finish().unwrap();
        bytes
    }

    #[test]
    fn test_oversized_shape_is_corrupt() {
        let bytes = header_with_dim(1 << 61);
        assert!(matches!(
            ArrayArchive::read_from(bytes.as_slice()),
            Err(ArchiveError::Corrupt(_))
        ));
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        for dim in [2, 1 << 40] {
            let bytes = header_with_dim(dim);
            assert!(matches!(
                ArrayArchive::read_from(bytes.as_slice()),
                Err(ArchiveError::Corrupt(_))
            ));
        }
        let archive = ArrayArchive::read_from(header_with_dim(1).as_slice()).unwrap();
        assert_eq!(archive.f64_array("scales").unwrap().1, &[0.5]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arrays.splatarc");
        sample().save(&path).unwrap();
        assert_eq!(ArrayArchive::load(&path).unwrap(), sample());
    }
}
