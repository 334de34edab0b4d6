//! Width-exact reading and writing of primitives in target memory.
//!
//! The host only moves raw bytes. This module layers typed access on top of it,
//! with one explicit code path per width and signedness: a value declared as
//! `int16` is always written as exactly two bytes, a `float` as exactly four
//! IEEE-754 bytes. A generic "write a number" path would silently change the
//! width of the store and corrupt whatever the runtime keeps next to it.
//!
//! All encodings are little-endian.
//!
//! # Key Components
//!
//! - [`NativeIO`] - Trait implemented by every primitive that can live in target memory
//! - [`read_native`] / [`write_native`] - Typed single-value access
//! - [`read_pointer`] / [`write_pointer`] - Pointer-width access for the target's pointer size
//! - [`read_value`] / [`write_value`] - Tag-driven access used by marshalling and unboxing
//! - [`read_c_string`] / [`alloc_c_string`] - NUL-terminated UTF-8 strings

use crate::{
    host::{HostEnvironment, NativePtr, NativeType, NativeValue},
    Error::OutOfBounds,
    Result,
};

/// Upper bound for C strings read from the target.
pub const MAX_C_STRING: usize = 64 * 1024;

const C_STRING_CHUNK: usize = 64;

/// Primitives with a fixed little-endian representation in target memory.
pub trait NativeIO: Sized + Copy {
    /// Byte representation of the type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decodes the value from little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encodes the value as little-endian bytes.
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_native_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl NativeIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_native_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
}

/// Decodes a value of type `T` from the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn decode_le<T: NativeIO>(data: &[u8]) -> Result<T> {
    let len = std::mem::size_of::<T>();
    if data.len() < len {
        return Err(OutOfBounds);
    }

    let Ok(bytes) = data[..len].try_into() else {
        return Err(OutOfBounds);
    };

    Ok(T::from_le_bytes(bytes))
}

/// Reads a value of type `T` from target memory.
///
/// # Arguments
///
/// * `host` - The host environment
/// * `address` - Where to read
///
/// # Errors
///
/// Returns an error if the memory is not readable.
pub fn read_native<T: NativeIO>(host: &dyn HostEnvironment, address: NativePtr) -> Result<T> {
    let data = host.read(address, std::mem::size_of::<T>())?;
    decode_le(&data)
}

/// Writes a value of type `T` to target memory, using exactly `size_of::<T>()` bytes.
///
/// # Errors
///
/// Returns an error if the memory is not writable.
pub fn write_native<T: NativeIO>(
    host: &dyn HostEnvironment,
    address: NativePtr,
    value: T,
) -> Result<()> {
    host.write(address, value.to_le_bytes().as_ref())
}

/// Reads a pointer of the target's pointer width.
///
/// # Errors
///
/// Returns an error if the memory is not readable.
pub fn read_pointer(host: &dyn HostEnvironment, address: NativePtr) -> Result<NativePtr> {
    if host.pointer_size() == 4 {
        Ok(NativePtr::new(u64::from(read_native::<u32>(host, address)?)))
    } else {
        Ok(NativePtr::new(read_native::<u64>(host, address)?))
    }
}

/// Writes a pointer of the target's pointer width.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the address does not fit a 32-bit target,
/// or an error if the memory is not writable.
pub fn write_pointer(
    host: &dyn HostEnvironment,
    address: NativePtr,
    value: NativePtr,
) -> Result<()> {
    if host.pointer_size() == 4 {
        let narrow = u32::try_from(value.address()).map_err(|_| OutOfBounds)?;
        write_native::<u32>(host, address, narrow)
    } else {
        write_native::<u64>(host, address, value.address())
    }
}

/// Reads a value of the given tag from target memory.
///
/// # Errors
///
/// Returns an error if the memory is not readable.
pub fn read_value(
    host: &dyn HostEnvironment,
    address: NativePtr,
    ty: NativeType,
) -> Result<NativeValue> {
    let pointer_wide = host.pointer_size() != 4;
    Ok(match ty {
        NativeType::Void => NativeValue::Void,
        NativeType::Bool => NativeValue::Bool(read_native::<u8>(host, address)? != 0),
        NativeType::I8 => NativeValue::I8(read_native::<i8>(host, address)?),
        NativeType::U8 => NativeValue::U8(read_native::<u8>(host, address)?),
        NativeType::I16 => NativeValue::I16(read_native::<i16>(host, address)?),
        NativeType::U16 => NativeValue::U16(read_native::<u16>(host, address)?),
        NativeType::I32 => NativeValue::I32(read_native::<i32>(host, address)?),
        NativeType::U32 => NativeValue::U32(read_native::<u32>(host, address)?),
        NativeType::I64 => NativeValue::I64(read_native::<i64>(host, address)?),
        NativeType::U64 => NativeValue::U64(read_native::<u64>(host, address)?),
        NativeType::F32 => NativeValue::F32(read_native::<f32>(host, address)?),
        NativeType::F64 => NativeValue::F64(read_native::<f64>(host, address)?),
        NativeType::ISize if pointer_wide => NativeValue::ISize(read_native::<i64>(host, address)?),
        NativeType::ISize => NativeValue::ISize(i64::from(read_native::<i32>(host, address)?)),
        NativeType::USize if pointer_wide => NativeValue::USize(read_native::<u64>(host, address)?),
        NativeType::USize => NativeValue::USize(u64::from(read_native::<u32>(host, address)?)),
        NativeType::Pointer => NativeValue::Pointer(read_pointer(host, address)?),
    })
}

/// Writes a value at its exact declared width.
///
/// [`NativeValue::Null`] is written as a null pointer; [`NativeValue::Void`] writes
/// nothing.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if a pointer-sized value does not fit a
/// 32-bit target, or an error if the memory is not writable.
pub fn write_value(
    host: &dyn HostEnvironment,
    address: NativePtr,
    value: &NativeValue,
) -> Result<()> {
    let pointer_wide = host.pointer_size() != 4;
    match *value {
        NativeValue::Void => Ok(()),
        NativeValue::Null => write_pointer(host, address, NativePtr::NULL),
        NativeValue::Bool(v) => write_native::<u8>(host, address, u8::from(v)),
        NativeValue::I8(v) => write_native::<i8>(host, address, v),
        NativeValue::U8(v) => write_native::<u8>(host, address, v),
        NativeValue::I16(v) => write_native::<i16>(host, address, v),
        NativeValue::U16(v) => write_native::<u16>(host, address, v),
        NativeValue::I32(v) => write_native::<i32>(host, address, v),
        NativeValue::U32(v) => write_native::<u32>(host, address, v),
        NativeValue::I64(v) => write_native::<i64>(host, address, v),
        NativeValue::U64(v) => write_native::<u64>(host, address, v),
        NativeValue::F32(v) => write_native::<f32>(host, address, v),
        NativeValue::F64(v) => write_native::<f64>(host, address, v),
        NativeValue::ISize(v) if pointer_wide => write_native::<i64>(host, address, v),
        NativeValue::ISize(v) => {
            write_native::<i32>(host, address, i32::try_from(v).map_err(|_| OutOfBounds)?)
        }
        NativeValue::USize(v) if pointer_wide => write_native::<u64>(host, address, v),
        NativeValue::USize(v) => {
            write_native::<u32>(host, address, u32::try_from(v).map_err(|_| OutOfBounds)?)
        }
        NativeValue::Pointer(ptr) => write_pointer(host, address, ptr),
    }
}

/// Reads a NUL-terminated UTF-8 string.
///
/// Reads in small chunks so that a string ending right before an unmapped page
/// is still recovered. Invalid UTF-8 is replaced lossily.
///
/// # Errors
///
/// Returns an error if the first byte is unreadable, or
/// [`crate::Error::OutOfBounds`] if no terminator is found within [`MAX_C_STRING`] bytes.
pub fn read_c_string(host: &dyn HostEnvironment, address: NativePtr) -> Result<String> {
    let mut bytes = Vec::new();
    let mut cursor = address;

    while bytes.len() < MAX_C_STRING {
        let chunk = match host.read(cursor, C_STRING_CHUNK) {
            Ok(chunk) => chunk,
            // Fall back to single bytes near the end of a readable region
            Err(_) => host.read(cursor, 1)?,
        };

        if let Some(end) = chunk.iter().position(|&b| b == 0) {
            bytes.extend_from_slice(&chunk[..end]);
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }

        bytes.extend_from_slice(&chunk);
        cursor = cursor.add(chunk.len());
    }

    Err(OutOfBounds)
}

/// Copies `text` into freshly allocated target memory as a NUL-terminated string.
///
/// # Errors
///
/// Returns an error if the allocation or the write fails.
pub fn alloc_c_string(host: &dyn HostEnvironment, text: &str) -> Result<NativePtr> {
    let mut data = Vec::with_capacity(text.len() + 1);
    data.extend_from_slice(text.as_bytes());
    data.push(0);

    let ptr = host.alloc(data.len())?;
    host.write(ptr, &data)?;
    Ok(ptr)
}
