//! Opaque typed buffers moved by the transport.
//!
//! Contents are never interpreted beyond the byte-length checks needed to
//! keep a tensor's shape and buffer consistent.

use bytes::{Bytes, BytesMut};

use crate::types::{Result, StrataError};

/// Numeric type code, bit width and vector lanes of a tensor element.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DataType {
    /// Type family, one of [`DataType::INT_CODE`], [`DataType::UINT_CODE`]
    /// or [`DataType::FLOAT_CODE`].
    pub code: u8,
    /// Bits per lane.
    pub bits: u8,
    /// Lanes per element.
    pub lanes: u16,
}

impl DataType {
    /// Signed integer family.
    pub const INT_CODE: u8 = 0;
    /// Unsigned integer family.
    pub const UINT_CODE: u8 = 1;
    /// Floating point family.
    pub const FLOAT_CODE: u8 = 2;

    /// 64-bit signed integers; used for id arrays.
    pub const INT64: DataType = DataType {
        code: Self::INT_CODE,
        bits: 64,
        lanes: 1,
    };

    /// 32-bit floats; used for key/value payloads.
    pub const FLOAT32: DataType = DataType {
        code: Self::FLOAT_CODE,
        bits: 32,
        lanes: 1,
    };

    /// Bytes occupied by one element.
    pub fn size_bytes(&self) -> usize {
        (self.bits as usize * self.lanes as usize).div_ceil(8)
    }
}

/// Where a tensor's memory lives.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Device {
    /// Host memory.
    #[default]
    Cpu,
}

/// Multi-dimensional buffer with element type and shape metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tensor {
    dtype: DataType,
    shape: Vec<i64>,
    device: Device,
    data: Bytes,
}

impl Tensor {
    /// Wraps `data` after checking it holds exactly `shape` elements of `dtype`.
    pub fn new(dtype: DataType, shape: Vec<i64>, data: Bytes) -> Result<Self> {
        let expected = byte_len(dtype, &shape)?;
        if data.len() != expected {
            return Err(StrataError::Precondition(format!(
                "tensor of shape {shape:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            dtype,
            shape,
            device: Device::Cpu,
            data,
        })
    }

    /// One-dimensional int64 tensor.
    pub fn from_i64(values: &[i64]) -> Self {
        let mut buf = BytesMut::with_capacity(values.len() * 8);
        for v in values {
            buf.extend_from_slice(&v.to_ne_bytes());
        }
        Self {
            dtype: DataType::INT64,
            shape: vec![values.len() as i64],
            device: Device::Cpu,
            data: buf.freeze(),
        }
    }

    /// One-dimensional int64 tensor holding graph ids.
    pub fn from_ids(ids: &[u64]) -> Result<Self> {
        let values = ids
            .iter()
            .map(|&id| {
                i64::try_from(id).map_err(|_| {
                    StrataError::Precondition(format!("id {id} does not fit in int64"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_i64(&values))
    }

    /// Float32 tensor of the given shape.
    pub fn from_f32(shape: Vec<i64>, values: &[f32]) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(values.len() * 4);
        for v in values {
            buf.extend_from_slice(&v.to_ne_bytes());
        }
        Self::new(DataType::FLOAT32, shape, buf.freeze())
    }

    /// Element type.
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Dimensions.
    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Memory location.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Raw buffer.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Buffer length in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Number of elements.
    pub fn num_elements(&self) -> usize {
        self.data.len() / self.dtype.size_bytes().max(1)
    }

    /// Contents as int64 values.
    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        self.expect_dtype(DataType::INT64)?;
        Ok(self
            .data
            .chunks_exact(8)
            .map(|c| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(c);
                i64::from_ne_bytes(raw)
            })
            .collect())
    }

    /// Contents as non-negative graph ids.
    pub fn to_ids(&self) -> Result<Vec<u64>> {
        self.to_i64_vec()?
            .into_iter()
            .map(|v| {
                u64::try_from(v)
                    .map_err(|_| StrataError::Protocol(format!("negative id {v} in id array")))
            })
            .collect()
    }

    /// Contents as float32 values.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        self.expect_dtype(DataType::FLOAT32)?;
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(c);
                f32::from_ne_bytes(raw)
            })
            .collect())
    }

    fn expect_dtype(&self, dtype: DataType) -> Result<()> {
        if self.dtype == dtype {
            Ok(())
        } else {
            Err(StrataError::Precondition(format!(
                "tensor holds {:?}, expected {dtype:?}",
                self.dtype
            )))
        }
    }
}

/// Bytes needed for `shape` elements of `dtype`.
pub(crate) fn byte_len(dtype: DataType, shape: &[i64]) -> Result<usize> {
    let mut elems: usize = 1;
    for &dim in shape {
        let dim = usize::try_from(dim)
            .map_err(|_| StrataError::Precondition(format!("negative dimension {dim}")))?;
        elems = elems
            .checked_mul(dim)
            .ok_or_else(|| StrataError::Precondition("tensor size overflows usize".into()))?;
    }
    elems
        .checked_mul(dtype.size_bytes())
        .ok_or_else(|| StrataError::Precondition("tensor size overflows usize".into()))
}
