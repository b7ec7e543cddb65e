//! NumPy compatible element data types.
//!
//! A [`DataType`] is described by a kind, an item size in bytes, and a byte order.
//! It is parsed from and displayed as a NumPy type string such as `<f4` or `|u1`.

use std::{fmt::Display, str::FromStr};

use thiserror::Error;

/// The byte order of a multi-byte element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Little endian (`<`).
    Little,
    /// Big endian (`>`).
    Big,
    /// Byte order is irrelevant, i.e. single byte elements (`|`).
    NotApplicable,
}

impl ByteOrder {
    /// The byte order of the target platform.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    const fn as_char(self) -> char {
        match self {
            Self::Little => '<',
            Self::Big => '>',
            Self::NotApplicable => '|',
        }
    }
}

/// The kind of a data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// `b`: boolean.
    Bool,
    /// `i`: signed integer.
    Int,
    /// `u`: unsigned integer.
    UInt,
    /// `f`: IEEE 754 floating point.
    Float,
    /// `c`: complex floating point.
    Complex,
}

impl TypeKind {
    const fn as_char(self) -> char {
        match self {
            Self::Bool => 'b',
            Self::Int => 'i',
            Self::UInt => 'u',
            Self::Float => 'f',
            Self::Complex => 'c',
        }
    }

    const fn supports_size(self, size: usize) -> bool {
        match self {
            Self::Bool => size == 1,
            Self::Int | Self::UInt => matches!(size, 1 | 2 | 4 | 8),
            Self::Float => matches!(size, 2 | 4 | 8),
            Self::Complex => matches!(size, 8 | 16),
        }
    }
}

/// An invalid or unsupported data type description.
#[derive(Debug, Clone, Error)]
#[error("invalid or unsupported data type {0:?}")]
pub struct DataTypeError(String);

impl DataTypeError {
    /// Create a new data type error for the description `descr`.
    #[must_use]
    pub fn new(descr: impl Into<String>) -> Self {
        Self(descr.into())
    }
}

/// An element data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    kind: TypeKind,
    size: usize,
    byte_order: ByteOrder,
}

impl DataType {
    /// Create a new data type.
    ///
    /// The byte order of single byte data types is normalised to [`ByteOrder::NotApplicable`].
    ///
    /// # Errors
    /// Returns a [`DataTypeError`] if `size` is not supported for `kind`,
    /// or a multi-byte data type has byte order [`ByteOrder::NotApplicable`].
    pub fn new(kind: TypeKind, size: usize, byte_order: ByteOrder) -> Result<Self, DataTypeError> {
        if !kind.supports_size(size) {
            return Err(DataTypeError::new(format!(
                "{}{}{size}",
                byte_order.as_char(),
                kind.as_char()
            )));
        }
        let byte_order = if size == 1 {
            ByteOrder::NotApplicable
        } else if byte_order == ByteOrder::NotApplicable {
            return Err(DataTypeError::new(format!("|{}{size}", kind.as_char())));
        } else {
            byte_order
        };
        Ok(Self {
            kind,
            size,
            byte_order,
        })
    }

    const fn native(kind: TypeKind, size: usize) -> Self {
        Self {
            kind,
            size,
            byte_order: if size == 1 {
                ByteOrder::NotApplicable
            } else {
                ByteOrder::native()
            },
        }
    }

    /// A boolean.
    pub const BOOL: Self = Self::native(TypeKind::Bool, 1);
    /// A native `i8`.
    pub const INT8: Self = Self::native(TypeKind::Int, 1);
    /// A native `i16`.
    pub const INT16: Self = Self::native(TypeKind::Int, 2);
    /// A native `i32`.
    pub const INT32: Self = Self::native(TypeKind::Int, 4);
    /// A native `i64`.
    pub const INT64: Self = Self::native(TypeKind::Int, 8);
    /// A native `u8`.
    pub const UINT8: Self = Self::native(TypeKind::UInt, 1);
    /// A native `u16`.
    pub const UINT16: Self = Self::native(TypeKind::UInt, 2);
    /// A native `u32`.
    pub const UINT32: Self = Self::native(TypeKind::UInt, 4);
    /// A native `u64`.
    pub const UINT64: Self = Self::native(TypeKind::UInt, 8);
    /// A native `f32`.
    pub const FLOAT32: Self = Self::native(TypeKind::Float, 4);
    /// A native `f64`.
    pub const FLOAT64: Self = Self::native(TypeKind::Float, 8);
    /// A native complex of two `f32`.
    pub const COMPLEX64: Self = Self::native(TypeKind::Complex, 8);
    /// A native complex of two `f64`.
    pub const COMPLEX128: Self = Self::native(TypeKind::Complex, 16);

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Returns the size of an element in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns the byte order.
    #[must_use]
    pub const fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Returns true if elements are stored in the native byte order of the platform.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.byte_order == ByteOrder::NotApplicable || self.byte_order == ByteOrder::native()
    }

    /// Returns the NumPy type string, e.g. `<f4`.
    #[must_use]
    pub fn descr(&self) -> String {
        self.to_string()
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.byte_order.as_char(),
            self.kind.as_char(),
            self.size
        )
    }
}

impl FromStr for DataType {
    type Err = DataTypeError;

    fn from_str(descr: &str) -> Result<Self, Self::Err> {
        let mut chars = descr.chars();
        let byte_order = match chars.next() {
            Some('<') => ByteOrder::Little,
            Some('>') => ByteOrder::Big,
            Some('|') => ByteOrder::NotApplicable,
            Some('=') => ByteOrder::native(),
            _ => return Err(DataTypeError::new(descr)),
        };
        let kind = match chars.next() {
            Some('b') => TypeKind::Bool,
            Some('i') => TypeKind::Int,
            Some('u') => TypeKind::UInt,
            Some('f') => TypeKind::Float,
            Some('c') => TypeKind::Complex,
            _ => return Err(DataTypeError::new(descr)),
        };
        let size: usize = chars
            .as_str()
            .parse()
            .map_err(|_| DataTypeError::new(descr))?;
        Self::new(kind, size, byte_order).map_err(|_| DataTypeError::new(descr))
    }
}
