//! The NPY format for chunk values.
//!
//! A stored chunk is an NPY file: a magic string, a version, a header describing the
//! data type, memory order and shape as a Python literal dictionary, and then the raw
//! element bytes. Headers are read and written with [`npyz`].
//!
//! See <https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html>.
//!
//! Only plain numeric data types are supported.
//! Object (pickled) and structured data types are always refused, so decoding never evaluates embedded objects.

use std::{
    borrow::Cow,
    io::{Cursor, Read, Write},
};

use npyz::{DType, NpyHeader, Order, WriterBuilder};
use thiserror::Error;

use crate::{
    chunk_array::ChunkArray,
    data_type::{DataType, TypeKind},
};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// The maximum accepted length of an NPY header.
///
/// Chunk headers are short, while the length field of a corrupt object can claim up to 4 GiB.
const MAX_HEADER_LEN: usize = 1 << 20;

/// An NPY encoding or decoding error.
#[derive(Debug, Error)]
pub enum NpyError {
    /// An IO error reading or writing the NPY stream.
    #[error(transparent)]
    Io(std::io::Error),
    /// The stream is not a valid or supported NPY file.
    #[error("invalid NPY data: {0}")]
    Format(String),
}

impl NpyError {
    fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }
}

impl From<std::io::Error> for NpyError {
    fn from(err: std::io::Error) -> Self {
        // npyz reports malformed headers as invalid data
        match err.kind() {
            std::io::ErrorKind::InvalidData => Self::Format(err.to_string()),
            std::io::ErrorKind::UnexpectedEof => Self::Format(format!("truncated header: {err}")),
            _ => Self::Io(err),
        }
    }
}

/// Read exactly `buf.len()` bytes, reporting a premature end of stream as a format error.
fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<(), NpyError> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            NpyError::format(format!("truncated {what}"))
        } else {
            NpyError::Io(err)
        }
    })
}

/// Returns the element bytes of `chunk` in native byte order.
fn native_bytes(chunk: &ChunkArray) -> Cow<'_, [u8]> {
    let data_type = chunk.data_type();
    if data_type.is_native() {
        return Cow::Borrowed(&chunk.bytes()[..]);
    }
    // The real and imaginary parts of a complex element are swapped separately
    let word = match data_type.kind() {
        TypeKind::Complex => data_type.size() / 2,
        _ => data_type.size(),
    };
    let mut bytes = chunk.bytes().to_vec();
    for word in bytes.chunks_exact_mut(word) {
        word.reverse();
    }
    Cow::Owned(bytes)
}

fn write_elements<T, W>(
    writer: W,
    chunk: &ChunkArray,
    elements: impl IntoIterator<Item = T>,
) -> Result<(), NpyError>
where
    T: npyz::Serialize,
    W: Write,
{
    let type_str = chunk
        .data_type()
        .descr()
        .parse()
        .map_err(|err: npyz::ParseTypeStrError| NpyError::format(err.to_string()))?;
    let mut writer = npyz::WriteOptions::<T>::new()
        .dtype(DType::Plain(type_str))
        .shape(chunk.shape())
        .writer(writer)
        .begin_nd()
        .map_err(NpyError::Io)?;
    writer.extend(elements).map_err(NpyError::Io)?;
    writer.finish().map_err(NpyError::Io)
}

fn write_pod<T, W>(writer: W, chunk: &ChunkArray) -> Result<(), NpyError>
where
    T: bytemuck::Pod + npyz::Serialize,
    W: Write,
{
    let elements = bytemuck::allocation::pod_collect_to_vec::<u8, T>(&native_bytes(chunk));
    write_elements(writer, chunk, elements)
}

/// Write a chunk as an NPY stream.
///
/// The header declares the data type of the chunk, so the element bytes are written unchanged.
///
/// # Errors
/// Returns [`NpyError::Io`] if writing fails.
pub fn write_chunk<W: Write>(writer: W, chunk: &ChunkArray) -> Result<(), NpyError> {
    let data_type = chunk.data_type();
    match (data_type.kind(), data_type.size()) {
        (TypeKind::Bool, 1) => {
            write_elements(writer, chunk, chunk.bytes().iter().map(|&byte| byte != 0))
        }
        (TypeKind::Int, 1) => write_pod::<i8, W>(writer, chunk),
        (TypeKind::Int, 2) => write_pod::<i16, W>(writer, chunk),
        (TypeKind::Int, 4) => write_pod::<i32, W>(writer, chunk),
        (TypeKind::Int, 8) => write_pod::<i64, W>(writer, chunk),
        (TypeKind::UInt, 1) => write_pod::<u8, W>(writer, chunk),
        (TypeKind::UInt, 2) => write_pod::<u16, W>(writer, chunk),
        (TypeKind::UInt, 4) => write_pod::<u32, W>(writer, chunk),
        (TypeKind::UInt, 8) => write_pod::<u64, W>(writer, chunk),
        (TypeKind::Float, 2) => {
            let bits = bytemuck::allocation::pod_collect_to_vec::<u8, u16>(&native_bytes(chunk));
            write_elements(writer, chunk, bits.into_iter().map(npyz::half::f16::from_bits))
        }
        (TypeKind::Float, 4) => write_pod::<f32, W>(writer, chunk),
        (TypeKind::Float, 8) => write_pod::<f64, W>(writer, chunk),
        (TypeKind::Complex, 8) => write_pod::<num_complex::Complex32, W>(writer, chunk),
        (TypeKind::Complex, 16) => write_pod::<num_complex::Complex64, W>(writer, chunk),
        _ => Err(NpyError::format(format!("data type {data_type} cannot be encoded"))),
    }
}

/// Encode a chunk as NPY bytes.
///
/// # Errors
/// Returns an [`NpyError`] if the chunk cannot be encoded.
pub fn encode_chunk(chunk: &ChunkArray) -> Result<Vec<u8>, NpyError> {
    let mut out = Vec::with_capacity(chunk.bytes().len() + 128);
    write_chunk(&mut out, chunk)?;
    Ok(out)
}

/// Read a chunk from an NPY stream.
///
/// Exactly the header and the element bytes are consumed from `reader`.
///
/// # Errors
/// Returns [`NpyError::Format`] if the stream is not a supported NPY file or ends prematurely,
/// or [`NpyError::Io`] if reading fails.
pub fn read_chunk<R: Read>(reader: &mut R) -> Result<ChunkArray, NpyError> {
    // The header length is checked before npyz allocates a buffer for the header
    let mut preamble = vec![0u8; 8];
    read_exact(reader, &mut preamble, "magic string")?;
    if &preamble[..6] != MAGIC {
        return Err(NpyError::format("missing NPY magic string"));
    }
    let header_len = match preamble[6] {
        1 => {
            let mut len = [0u8; 2];
            read_exact(reader, &mut len, "header length")?;
            preamble.extend_from_slice(&len);
            usize::from(u16::from_le_bytes(len))
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            read_exact(reader, &mut len, "header length")?;
            preamble.extend_from_slice(&len);
            usize::try_from(u32::from_le_bytes(len)).unwrap_or(usize::MAX)
        }
        major => {
            return Err(NpyError::format(format!(
                "unsupported NPY version {major}.{}",
                preamble[7]
            )))
        }
    };
    if header_len > MAX_HEADER_LEN {
        return Err(NpyError::format(format!(
            "header length {header_len} exceeds {MAX_HEADER_LEN} bytes"
        )));
    }
    let header = NpyHeader::from_reader(
        Cursor::new(preamble).chain(Read::take(&mut *reader, header_len as u64)),
    )?;

    let data_type = match header.dtype() {
        DType::Plain(type_str) => type_str.to_string().parse::<DataType>().map_err(|err| {
            NpyError::format(format!("unsupported data type {type_str}: {err}"))
        })?,
        dtype => {
            return Err(NpyError::format(format!(
                "structured data type {} is not supported",
                dtype.descr()
            )))
        }
    };
    let shape = header.shape().to_vec();

    let len = shape
        .iter()
        .try_fold(data_type.size() as u64, |acc, &n| acc.checked_mul(n))
        .and_then(|len| usize::try_from(len).ok())
        .ok_or_else(|| NpyError::format(format!("shape {shape:?} is too large")))?;
    let mut bytes = Vec::new();
    Read::take(&mut *reader, len as u64)
        .read_to_end(&mut bytes)
        .map_err(NpyError::Io)?;
    if bytes.len() != len {
        return Err(NpyError::format("truncated array data"));
    }
    if header.order() == Order::Fortran && shape.len() > 1 {
        log::debug!("transposing Fortran ordered NPY array with shape {shape:?}");
        bytes = fortran_to_c_order(&bytes, &shape, data_type.size());
    }
    ChunkArray::new(data_type, shape, bytes).map_err(|err| NpyError::format(err.to_string()))
}

/// Decode a chunk from NPY bytes.
///
/// # Errors
/// Returns [`NpyError::Format`] if `bytes` is not a supported NPY file.
pub fn decode_chunk(bytes: &[u8]) -> Result<ChunkArray, NpyError> {
    let mut reader = bytes;
    read_chunk(&mut reader)
}

/// Reorder the elements of a column-major array into row-major order.
fn fortran_to_c_order(bytes: &[u8], shape: &[u64], element_size: usize) -> Vec<u8> {
    #[allow(clippy::cast_possible_truncation)]
    let shape: Vec<usize> = shape.iter().map(|&n| n as usize).collect();
    let mut strides = vec![element_size; shape.len()];
    for i in 1..shape.len() {
        strides[i] = strides[i - 1] * shape[i - 1];
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = vec![0usize; shape.len()];
    if shape.contains(&0) {
        return out;
    }
    loop {
        let offset: usize = index.iter().zip(&strides).map(|(i, s)| i * s).sum();
        out.extend_from_slice(&bytes[offset..offset + element_size]);
        // Increment the row-major multi-index, last dimension fastest
        let mut dim = shape.len();
        loop {
            if dim == 0 {
                return out;
            }
            dim -= 1;
            index[dim] += 1;
            if index[dim] < shape[dim] {
                break;
            }
            index[dim] = 0;
        }
    }
}
