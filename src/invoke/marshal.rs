//! Host values and their conversion into native argument storage.

use std::sync::Arc;

use tracing::debug;

use crate::{
    host::{io, HostEnvironment, NativePtr, NativeValue},
    invoke::types::PrimitiveKind,
    Result,
};

/// A value supplied by the caller of a managed method.
///
/// Values are resolved against the declared parameter types on every call, so the
/// same `Integer` becomes a 1-byte `sbyte` for one method and an 8-byte `long`
/// for another.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    /// `null`, or a missing trailing argument
    Null,
    /// An existing runtime handle, passed through unchanged
    Handle(NativePtr),
    /// Text, converted into a `System.String`
    Text(String),
    /// An integer; range-checked against the declared width
    Integer(i128),
    /// A floating point number
    Float(f64),
    /// A boolean
    Boolean(bool),
}

impl HostValue {
    /// Short name of the variant, for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Handle(_) => "handle",
            HostValue::Text(_) => "text",
            HostValue::Integer(_) => "integer",
            HostValue::Float(_) => "float",
            HostValue::Boolean(_) => "boolean",
        }
    }
}

macro_rules! host_integer_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for HostValue {
                fn from(value: $ty) -> Self {
                    HostValue::Integer(i128::from(value))
                }
            }
        )*
    };
}

host_integer_from!(i8, u8, i16, u16, i32, u32, i64, u64);

impl From<isize> for HostValue {
    fn from(value: isize) -> Self {
        HostValue::Integer(value as i128)
    }
}

impl From<usize> for HostValue {
    fn from(value: usize) -> Self {
        HostValue::Integer(value as i128)
    }
}

impl From<f32> for HostValue {
    fn from(value: f32) -> Self {
        HostValue::Float(f64::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Boolean(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Text(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Text(value)
    }
}

impl From<NativePtr> for HostValue {
    fn from(value: NativePtr) -> Self {
        HostValue::Handle(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}

/// Converts a host value into the exact native value of `kind`.
///
/// Integers are range-checked against the declared width and signedness
/// (pointer-sized kinds against `pointer_size`). Floats are accepted for integer
/// kinds only if they hold an integral value; booleans convert to `0`/`1`.
///
/// # Errors
///
/// Returns a description of the mismatch, which the caller wraps into
/// [`crate::Error::ArgumentMarshal`].
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn encode_primitive(
    kind: PrimitiveKind,
    value: &HostValue,
    pointer_size: usize,
) -> std::result::Result<NativeValue, String> {
    if kind == PrimitiveKind::Boolean {
        return match value {
            HostValue::Boolean(v) => Ok(NativeValue::Bool(*v)),
            HostValue::Integer(0) => Ok(NativeValue::Bool(false)),
            HostValue::Integer(1) => Ok(NativeValue::Bool(true)),
            other => Err(format!("{} is not a bool", describe(other))),
        };
    }

    if matches!(kind, PrimitiveKind::F32 | PrimitiveKind::F64) {
        let float = match value {
            HostValue::Float(v) => *v,
            HostValue::Integer(v) => *v as f64,
            other => return Err(format!("{} is not a number", describe(other))),
        };
        return Ok(if kind == PrimitiveKind::F32 {
            NativeValue::F32(float as f32)
        } else {
            NativeValue::F64(float)
        });
    }

    let integer = match value {
        HostValue::Integer(v) => *v,
        HostValue::Boolean(v) => i128::from(*v),
        HostValue::Float(v) if v.is_finite() && v.fract() == 0.0 => *v as i128,
        other => return Err(format!("{} is not an integer", describe(other))),
    };

    let out_of_range = || format!("{integer} is out of range for {kind}");
    let narrow = pointer_size == 4;
    Ok(match kind {
        PrimitiveKind::I8 => NativeValue::I8(i8::try_from(integer).map_err(|_| out_of_range())?),
        PrimitiveKind::U8 => NativeValue::U8(u8::try_from(integer).map_err(|_| out_of_range())?),
        PrimitiveKind::I16 => NativeValue::I16(i16::try_from(integer).map_err(|_| out_of_range())?),
        PrimitiveKind::U16 | PrimitiveKind::Char => {
            NativeValue::U16(u16::try_from(integer).map_err(|_| out_of_range())?)
        }
        PrimitiveKind::I32 => NativeValue::I32(i32::try_from(integer).map_err(|_| out_of_range())?),
        PrimitiveKind::U32 => NativeValue::U32(u32::try_from(integer).map_err(|_| out_of_range())?),
        PrimitiveKind::I64 => NativeValue::I64(i64::try_from(integer).map_err(|_| out_of_range())?),
        PrimitiveKind::U64 => NativeValue::U64(u64::try_from(integer).map_err(|_| out_of_range())?),
        PrimitiveKind::ISize if narrow => {
            NativeValue::ISize(i64::from(i32::try_from(integer).map_err(|_| out_of_range())?))
        }
        PrimitiveKind::ISize => {
            NativeValue::ISize(i64::try_from(integer).map_err(|_| out_of_range())?)
        }
        PrimitiveKind::USize if narrow => {
            NativeValue::USize(u64::from(u32::try_from(integer).map_err(|_| out_of_range())?))
        }
        PrimitiveKind::USize => {
            NativeValue::USize(u64::try_from(integer).map_err(|_| out_of_range())?)
        }
        // Converted before the integer path
        PrimitiveKind::Boolean => NativeValue::Bool(integer != 0),
        PrimitiveKind::F32 => NativeValue::F32(integer as f32),
        PrimitiveKind::F64 => NativeValue::F64(integer as f64),
    })
}

fn describe(value: &HostValue) -> String {
    match value {
        HostValue::Text(text) => format!("text {text:?}"),
        other => other.kind_name().to_string(),
    }
}

/// Scratch memory owned by a single call.
///
/// Every allocation is released when the arena is dropped, on success and on
/// every error path alike.
pub struct ScratchArena {
    host: Arc<dyn HostEnvironment>,
    allocations: Vec<NativePtr>,
}

impl ScratchArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new(host: Arc<dyn HostEnvironment>) -> Self {
        ScratchArena {
            host,
            allocations: Vec::new(),
        }
    }

    /// Allocates `size` zeroed bytes.
    ///
    /// # Errors
    ///
    /// Returns the host's allocation error.
    pub fn alloc(&mut self, size: usize) -> Result<NativePtr> {
        let ptr = self.host.alloc(size.max(1))?;
        self.allocations.push(ptr);
        Ok(ptr)
    }

    /// Stores a value in a slot at least one pointer wide.
    ///
    /// # Errors
    ///
    /// Returns the host's allocation or write error.
    pub fn store(&mut self, value: &NativeValue) -> Result<NativePtr> {
        let width = value
            .native_type()
            .map_or(0, |ty| ty.size(self.host.pointer_size()));
        let ptr = self.alloc(width.max(self.host.pointer_size()))?;
        io::write_value(self.host.as_ref(), ptr, value)?;
        Ok(ptr)
    }

    /// Stores a pointer array, returning null for an empty slice.
    ///
    /// # Errors
    ///
    /// Returns the host's allocation or write error.
    pub fn store_pointers(&mut self, pointers: &[NativePtr]) -> Result<NativePtr> {
        if pointers.is_empty() {
            return Ok(NativePtr::NULL);
        }

        let pointer_size = self.host.pointer_size();
        let array = self.alloc(pointers.len() * pointer_size)?;
        for (index, pointer) in pointers.iter().enumerate() {
            io::write_pointer(self.host.as_ref(), array.add(index * pointer_size), *pointer)?;
        }
        Ok(array)
    }

    /// Stores `text` as a NUL-terminated UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns the host's allocation or write error.
    pub fn store_c_string(&mut self, text: &str) -> Result<NativePtr> {
        let ptr = io::alloc_c_string(self.host.as_ref(), text)?;
        self.allocations.push(ptr);
        Ok(ptr)
    }

    /// Number of live allocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    /// Returns `true` if nothing was allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}

impl Drop for ScratchArena {
    fn drop(&mut self) {
        for ptr in self.allocations.drain(..) {
            if let Err(error) = self.host.free(ptr) {
                debug!(
                    target: "monoscope::invoke",
                    %ptr,
                    %error,
                    "failed to release scratch memory"
                );
            }
        }
    }
}
