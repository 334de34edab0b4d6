//! Managed results and their conversion into host types.

use crate::{
    config::Int64Mode,
    host::{NativePtr, NativeValue},
    invoke::types::PrimitiveKind,
    Error, Result,
};

/// A value returned by a managed method, unboxed by its declared return type.
#[derive(Clone, Debug, PartialEq)]
pub enum ManagedValue {
    /// The method returns `void`
    Void,
    /// A null reference, or a suppressed managed exception
    Null,
    /// `bool`
    Bool(bool),
    /// `char` as its UTF-16 code unit
    Char(u16),
    /// `sbyte`
    I8(i8),
    /// `byte`
    U8(u8),
    /// `short`
    I16(i16),
    /// `ushort`
    U16(u16),
    /// `int`
    I32(i32),
    /// `uint`
    U32(u32),
    /// `long`
    I64(i64),
    /// `ulong`
    U64(u64),
    /// `float`
    F32(f32),
    /// `double`, and 64-bit integers in [`Int64Mode::Lossy`]
    F64(f64),
    /// `nint`
    ISize(i64),
    /// `nuint`
    USize(u64),
    /// `string`, copied into the host
    String(String),
    /// A reference-type object, not copied
    Object(NativePtr),
    /// A value type without a known layout, left boxed
    Boxed(NativePtr),
}

impl ManagedValue {
    /// Converts a native value read from an unboxed object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueConversion`] if `value` does not have the storage
    /// type of `kind`.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_native(kind: PrimitiveKind, value: NativeValue, mode: Int64Mode) -> Result<Self> {
        let lossy = mode == Int64Mode::Lossy;
        Ok(match (kind, value) {
            (PrimitiveKind::Boolean, NativeValue::Bool(v)) => ManagedValue::Bool(v),
            (PrimitiveKind::Char, NativeValue::U16(v)) => ManagedValue::Char(v),
            (PrimitiveKind::I8, NativeValue::I8(v)) => ManagedValue::I8(v),
            (PrimitiveKind::U8, NativeValue::U8(v)) => ManagedValue::U8(v),
            (PrimitiveKind::I16, NativeValue::I16(v)) => ManagedValue::I16(v),
            (PrimitiveKind::U16, NativeValue::U16(v)) => ManagedValue::U16(v),
            (PrimitiveKind::I32, NativeValue::I32(v)) => ManagedValue::I32(v),
            (PrimitiveKind::U32, NativeValue::U32(v)) => ManagedValue::U32(v),
            (PrimitiveKind::I64, NativeValue::I64(v)) if lossy => ManagedValue::F64(v as f64),
            (PrimitiveKind::I64, NativeValue::I64(v)) => ManagedValue::I64(v),
            (PrimitiveKind::U64, NativeValue::U64(v)) if lossy => ManagedValue::F64(v as f64),
            (PrimitiveKind::U64, NativeValue::U64(v)) => ManagedValue::U64(v),
            (PrimitiveKind::F32, NativeValue::F32(v)) => ManagedValue::F32(v),
            (PrimitiveKind::F64, NativeValue::F64(v)) => ManagedValue::F64(v),
            (PrimitiveKind::ISize, NativeValue::ISize(v)) => ManagedValue::ISize(v),
            (PrimitiveKind::USize, NativeValue::USize(v)) => ManagedValue::USize(v),
            (_, other) => {
                return Err(Error::ValueConversion {
                    expected: kind.into(),
                    found: crate::binder::value_kind(&other),
                })
            }
        })
    }

    /// Short name of the variant, for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            ManagedValue::Void => "void",
            ManagedValue::Null => "null",
            ManagedValue::Bool(_) => "bool",
            ManagedValue::Char(_) => "char",
            ManagedValue::I8(_) => "sbyte",
            ManagedValue::U8(_) => "byte",
            ManagedValue::I16(_) => "short",
            ManagedValue::U16(_) => "ushort",
            ManagedValue::I32(_) => "int",
            ManagedValue::U32(_) => "uint",
            ManagedValue::I64(_) => "long",
            ManagedValue::U64(_) => "ulong",
            ManagedValue::F32(_) => "float",
            ManagedValue::F64(_) => "double",
            ManagedValue::ISize(_) => "nint",
            ManagedValue::USize(_) => "nuint",
            ManagedValue::String(_) => "string",
            ManagedValue::Object(_) => "object",
            ManagedValue::Boxed(_) => "boxed struct",
        }
    }

    /// Returns `true` for [`ManagedValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ManagedValue::Null)
    }

    /// The runtime handle of an object or boxed value.
    #[must_use]
    pub fn as_handle(&self) -> Option<NativePtr> {
        match self {
            ManagedValue::Object(ptr) | ManagedValue::Boxed(ptr) => Some(*ptr),
            _ => None,
        }
    }
}

/// Conversion of a [`ManagedValue`] into a host type.
///
/// Integer targets accept every managed integer that converts without loss, so a
/// `short` result can be read as `i64`.
pub trait FromManagedValue: Sized {
    /// Name of the target type, for error messages.
    const EXPECTED: &'static str;

    /// Performs the conversion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueConversion`] if the value does not fit.
    fn from_managed(value: ManagedValue) -> Result<Self>;
}

fn mismatch<T: FromManagedValue>(value: &ManagedValue) -> Error {
    Error::ValueConversion {
        expected: T::EXPECTED,
        found: value.kind_name(),
    }
}

impl FromManagedValue for ManagedValue {
    const EXPECTED: &'static str = "any";

    fn from_managed(value: ManagedValue) -> Result<Self> {
        Ok(value)
    }
}

impl FromManagedValue for () {
    const EXPECTED: &'static str = "void";

    fn from_managed(value: ManagedValue) -> Result<Self> {
        match value {
            ManagedValue::Void | ManagedValue::Null => Ok(()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromManagedValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_managed(value: ManagedValue) -> Result<Self> {
        match value {
            ManagedValue::Bool(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromManagedValue for char {
    const EXPECTED: &'static str = "char";

    fn from_managed(value: ManagedValue) -> Result<Self> {
        match value {
            ManagedValue::Char(unit) => char::from_u32(u32::from(unit))
                .ok_or_else(|| mismatch::<Self>(&ManagedValue::Char(unit))),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

macro_rules! integer_from_managed {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromManagedValue for $ty {
                const EXPECTED: &'static str = $name;

                fn from_managed(value: ManagedValue) -> Result<Self> {
                    let converted = match &value {
                        ManagedValue::I8(v) => <$ty>::try_from(*v).ok(),
                        ManagedValue::U8(v) => <$ty>::try_from(*v).ok(),
                        ManagedValue::I16(v) => <$ty>::try_from(*v).ok(),
                        ManagedValue::U16(v) | ManagedValue::Char(v) => <$ty>::try_from(*v).ok(),
                        ManagedValue::I32(v) => <$ty>::try_from(*v).ok(),
                        ManagedValue::U32(v) => <$ty>::try_from(*v).ok(),
                        ManagedValue::I64(v) | ManagedValue::ISize(v) => <$ty>::try_from(*v).ok(),
                        ManagedValue::U64(v) | ManagedValue::USize(v) => <$ty>::try_from(*v).ok(),
                        _ => None,
                    };
                    converted.ok_or_else(|| mismatch::<Self>(&value))
                }
            }
        )*
    };
}

integer_from_managed!(
    i8 => "i8",
    u8 => "u8",
    i16 => "i16",
    u16 => "u16",
    i32 => "i32",
    u32 => "u32",
    i64 => "i64",
    u64 => "u64",
);

impl FromManagedValue for f32 {
    const EXPECTED: &'static str = "f32";

    fn from_managed(value: ManagedValue) -> Result<Self> {
        match value {
            ManagedValue::F32(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromManagedValue for f64 {
    const EXPECTED: &'static str = "f64";

    fn from_managed(value: ManagedValue) -> Result<Self> {
        match value {
            ManagedValue::F32(v) => Ok(f64::from(v)),
            ManagedValue::F64(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromManagedValue for String {
    const EXPECTED: &'static str = "string";

    fn from_managed(value: ManagedValue) -> Result<Self> {
        match value {
            ManagedValue::String(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromManagedValue for NativePtr {
    const EXPECTED: &'static str = "handle";

    fn from_managed(value: ManagedValue) -> Result<Self> {
        match value {
            ManagedValue::Object(ptr) | ManagedValue::Boxed(ptr) => Ok(ptr),
            ManagedValue::Null => Ok(NativePtr::NULL),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: FromManagedValue> FromManagedValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_managed(value: ManagedValue) -> Result<Self> {
        match value {
            ManagedValue::Null => Ok(None),
            other => T::from_managed(other).map(Some),
        }
    }
}
