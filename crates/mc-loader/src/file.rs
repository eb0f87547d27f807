use std::collections::BTreeMap;
use std::path::Path;

use memmap2::Mmap;
use serde::Deserialize;

use mc_mat::Mat;

use crate::error::{LoaderError, Result};

/// Element types a tensor file can declare.
///
/// `I32` exists only on the file side; it is widened to `i64` on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorDType {
    I32,
    I64,
    F32,
}

impl TensorDType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "I32" => Some(TensorDType::I32),
            "I64" => Some(TensorDType::I64),
            "F32" => Some(TensorDType::F32),
            _ => None,
        }
    }

    fn size_in_bytes(self) -> usize {
        match self {
            TensorDType::I32 | TensorDType::F32 => 4,
            TensorDType::I64 => 8,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TensorDType::I32 => "I32",
            TensorDType::I64 => "I64",
            TensorDType::F32 => "F32",
        }
    }
}

/// Shape and location of one tensor inside the file.
#[derive(Debug, Clone)]
pub struct TensorInfo {
    pub dtype: TensorDType,
    pub rows: usize,
    pub cols: usize,
    /// Byte range relative to the start of the data region.
    begin: usize,
    end: usize,
}

/// The JSON shape of one header entry, e.g.
/// `{"dtype":"I32","shape":[128,128],"data_offsets":[0,65536]}`.
#[derive(Debug, Deserialize)]
struct RawTensorMeta {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// A parsed tensor file backed by a memory-mapped region.
///
/// Layout: a little-endian `u64` header length, the JSON header, then raw
/// tensor bytes at the offsets the header declares. After parsing, tensor
/// data is accessed directly through the mapping without further reads.
#[derive(Debug)]
pub struct TensorFile {
    mmap: Mmap,
    infos: BTreeMap<String, TensorInfo>,
    data_offset: usize,
}

impl TensorFile {
    /// Open and parse a tensor file from disk.
    pub fn open(path: &Path) -> Result<TensorFile> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < 8 {
            return Err(LoaderError::TruncatedHeader(0));
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&mmap[..8]);
        let header_len = u64::from_le_bytes(len_bytes);

        let data_offset = 8usize
            .checked_add(header_len as usize)
            .filter(|&end| end <= mmap.len())
            .ok_or(LoaderError::TruncatedHeader(header_len))?;

        let header: BTreeMap<String, serde_json::Value> =
            serde_json::from_slice(&mmap[8..data_offset])?;

        let data_len = mmap.len() - data_offset;
        let mut infos = BTreeMap::new();
        for (name, value) in header {
            // The optional free-form metadata entry carries no tensor.
            if name == "__metadata__" {
                continue;
            }

            let meta: RawTensorMeta = serde_json::from_value(value)?;
            let dtype = TensorDType::parse(&meta.dtype).ok_or_else(|| {
                LoaderError::UnsupportedDType {
                    name: name.clone(),
                    dtype: meta.dtype.clone(),
                }
            })?;

            if meta.shape.len() != 2 {
                return Err(LoaderError::BadShape(name));
            }
            let (rows, cols) = (meta.shape[0], meta.shape[1]);

            let [begin, end] = meta.data_offsets;
            let expected = rows * cols * dtype.size_in_bytes();
            if begin > end || end > data_len || end - begin != expected {
                return Err(LoaderError::BadOffsets(name));
            }

            infos.insert(
                name,
                TensorInfo {
                    dtype,
                    rows,
                    cols,
                    begin,
                    end,
                },
            );
        }

        Ok(TensorFile {
            mmap,
            infos,
            data_offset,
        })
    }

    /// Names of all tensors in the file, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.infos.keys().map(String::as_str)
    }

    /// Shape and dtype of one tensor.
    pub fn info(&self, name: &str) -> Option<&TensorInfo> {
        self.infos.get(name)
    }

    fn lookup(&self, name: &str) -> Result<&TensorInfo> {
        self.infos
            .get(name)
            .ok_or_else(|| LoaderError::TensorNotFound(name.to_string()))
    }

    /// Raw bytes of one tensor within the mapped region.
    fn tensor_bytes(&self, info: &TensorInfo) -> &[u8] {
        &self.mmap[self.data_offset + info.begin..self.data_offset + info.end]
    }

    /// Load an integer tensor as an `i64` matrix; `I32` data is widened.
    pub fn load_i64(&self, name: &str) -> Result<Mat<i64>> {
        let info = self.lookup(name)?;
        let raw = self.tensor_bytes(info);

        match info.dtype {
            TensorDType::I32 => {
                let values = decode_i32(raw);
                Ok(Mat::from_raw(&values, info.cols, info.rows, info.cols))
            }
            TensorDType::I64 => {
                let values = decode_i64(raw);
                Ok(Mat::from_raw(&values, info.cols, info.rows, info.cols))
            }
            TensorDType::F32 => Err(LoaderError::DTypeMismatch {
                name: name.to_string(),
                expected: "I64",
                got: info.dtype.as_str(),
            }),
        }
    }

    /// Load a floating-point tensor as an `f32` matrix.
    pub fn load_f32(&self, name: &str) -> Result<Mat<f32>> {
        let info = self.lookup(name)?;
        let raw = self.tensor_bytes(info);

        match info.dtype {
            TensorDType::F32 => {
                let values = decode_f32(raw);
                Ok(Mat::from_raw(&values, info.cols, info.rows, info.cols))
            }
            other => Err(LoaderError::DTypeMismatch {
                name: name.to_string(),
                expected: "F32",
                got: other.as_str(),
            }),
        }
    }
}

/// Reinterpret raw little-endian bytes as i32 values.
fn decode_i32(data: &[u8]) -> Vec<i32> {
    let mut out = Vec::with_capacity(data.len() / 4);
    for chunk in data.chunks_exact(4) {
        out.push(i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    out
}

/// Reinterpret raw little-endian bytes as i64 values.
fn decode_i64(data: &[u8]) -> Vec<i64> {
    let mut out = Vec::with_capacity(data.len() / 8);
    for chunk in data.chunks_exact(8) {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(chunk);
        out.push(i64::from_le_bytes(bytes));
    }
    out
}

/// Reinterpret raw little-endian bytes as f32 values.
fn decode_f32(data: &[u8]) -> Vec<f32> {
    let mut out = Vec::with_capacity(data.len() / 4);
    for chunk in data.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    out
}
