//! In-memory chunk arrays.

use bytes::Bytes;
use num_complex::{Complex32, Complex64};
use thiserror::Error;

use crate::data_type::DataType;

/// The shape of an array or chunk.
pub type ArrayShape = Vec<u64>;

/// A trait for plain-old-data array elements with a native [`DataType`].
pub trait Element: bytemuck::Pod {
    /// The data type of the element in native byte order.
    const DATA_TYPE: DataType;
}

macro_rules! impl_element {
    ($raw_type:ty, $data_type:expr) => {
        impl Element for $raw_type {
            const DATA_TYPE: DataType = $data_type;
        }
    };
}

impl_element!(i8, DataType::INT8);
impl_element!(i16, DataType::INT16);
impl_element!(i32, DataType::INT32);
impl_element!(i64, DataType::INT64);
impl_element!(u8, DataType::UINT8);
impl_element!(u16, DataType::UINT16);
impl_element!(u32, DataType::UINT32);
impl_element!(u64, DataType::UINT64);
impl_element!(f32, DataType::FLOAT32);
impl_element!(f64, DataType::FLOAT64);
impl_element!(Complex32, DataType::COMPLEX64);
impl_element!(Complex64, DataType::COMPLEX128);

/// A chunk array error.
#[derive(Debug, Clone, Error)]
pub enum ChunkArrayError {
    /// The number of bytes does not match the shape and data type.
    #[error("expected {expected} bytes for shape {shape:?} and data type {data_type}, got {actual}")]
    InvalidLength {
        /// The data type.
        data_type: DataType,
        /// The shape.
        shape: ArrayShape,
        /// The expected number of bytes.
        expected: u64,
        /// The actual number of bytes.
        actual: u64,
    },
    /// The element type is incompatible with the data type.
    #[error("element type with data type {element} is incompatible with data type {data_type}")]
    IncompatibleElementType {
        /// The data type of the chunk.
        data_type: DataType,
        /// The native data type of the requested element.
        element: DataType,
    },
}

/// A dense chunk: a data type, a shape, and raw element bytes in row-major (C) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkArray {
    data_type: DataType,
    shape: ArrayShape,
    bytes: Bytes,
}

impl ChunkArray {
    /// Create a new chunk array from raw bytes.
    ///
    /// # Errors
    /// Returns [`ChunkArrayError::InvalidLength`] if the length of `bytes` is inconsistent with `shape` and `data_type`.
    pub fn new(
        data_type: DataType,
        shape: ArrayShape,
        bytes: impl Into<Bytes>,
    ) -> Result<Self, ChunkArrayError> {
        let bytes = bytes.into();
        let expected = shape.iter().product::<u64>() * data_type.size() as u64;
        if expected == bytes.len() as u64 {
            Ok(Self {
                data_type,
                shape,
                bytes,
            })
        } else {
            Err(ChunkArrayError::InvalidLength {
                data_type,
                shape,
                expected,
                actual: bytes.len() as u64,
            })
        }
    }

    /// Create a new chunk array from elements in row-major order.
    ///
    /// # Errors
    /// Returns [`ChunkArrayError::InvalidLength`] if the number of elements is inconsistent with `shape`.
    pub fn from_elements<T: Element>(
        shape: ArrayShape,
        elements: Vec<T>,
    ) -> Result<Self, ChunkArrayError> {
        let bytes: Vec<u8> = bytemuck::allocation::pod_collect_to_vec(elements.as_slice());
        Self::new(T::DATA_TYPE, shape, bytes)
    }

    /// Create a chunk array filled with zero bytes.
    #[must_use]
    pub fn zeros(data_type: DataType, shape: ArrayShape) -> Self {
        let len = shape.iter().product::<u64>() as usize * data_type.size();
        Self {
            data_type,
            shape,
            bytes: Bytes::from(vec![0; len]),
        }
    }

    /// Returns the elements in row-major order.
    ///
    /// # Errors
    /// Returns [`ChunkArrayError::IncompatibleElementType`] if the data type of the chunk is not the native data type of `T`.
    pub fn to_elements<T: Element>(&self) -> Result<Vec<T>, ChunkArrayError> {
        if self.data_type == T::DATA_TYPE {
            Ok(bytemuck::allocation::pod_collect_to_vec(&self.bytes[..]))
        } else {
            Err(ChunkArrayError::IncompatibleElementType {
                data_type: self.data_type,
                element: T::DATA_TYPE,
            })
        }
    }

    /// Returns the data type.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns the raw element bytes in row-major order.
    #[must_use]
    pub const fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Consume the chunk array and return the raw element bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}
