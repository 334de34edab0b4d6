use strum::{Display, EnumIter, EnumString};

use crate::host::NativePtr;

/// ABI type tag used when binding and calling native functions.
///
/// The string forms are the tags used by signature tables and C header mapping;
/// several C spellings parse into the same tag (`int` and `int32` are both
/// [`NativeType::I32`]). `long`/`ulong` follow the pointer width of the target,
/// which is correct for every LP64 Mono build and for 32-bit Windows builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString, Display, EnumIter)]
pub enum NativeType {
    /// No value
    #[strum(to_string = "void")]
    Void,
    /// C `bool`, one byte
    #[strum(to_string = "bool")]
    Bool,
    /// Signed 8-bit integer
    #[strum(to_string = "int8", serialize = "char", serialize = "schar")]
    I8,
    /// Unsigned 8-bit integer
    #[strum(to_string = "uint8", serialize = "uchar")]
    U8,
    /// Signed 16-bit integer
    #[strum(to_string = "int16", serialize = "short")]
    I16,
    /// Unsigned 16-bit integer
    #[strum(to_string = "uint16", serialize = "ushort")]
    U16,
    /// Signed 32-bit integer
    #[strum(to_string = "int", serialize = "int32")]
    I32,
    /// Unsigned 32-bit integer
    #[strum(to_string = "uint", serialize = "uint32")]
    U32,
    /// Signed 64-bit integer
    #[strum(to_string = "int64")]
    I64,
    /// Unsigned 64-bit integer
    #[strum(to_string = "uint64")]
    U64,
    /// 32-bit IEEE float
    #[strum(to_string = "float")]
    F32,
    /// 64-bit IEEE float
    #[strum(to_string = "double")]
    F64,
    /// Pointer-sized signed integer
    #[strum(to_string = "long", serialize = "ssize_t")]
    ISize,
    /// Pointer-sized unsigned integer
    #[strum(to_string = "size_t", serialize = "ulong")]
    USize,
    /// Any native pointer or opaque handle
    #[strum(to_string = "pointer")]
    Pointer,
}

impl NativeType {
    /// Storage size of a value of this type in bytes.
    ///
    /// # Arguments
    ///
    /// * `pointer_size` - Pointer width of the target process
    #[must_use]
    pub fn size(self, pointer_size: usize) -> usize {
        match self {
            NativeType::Void => 0,
            NativeType::Bool | NativeType::I8 | NativeType::U8 => 1,
            NativeType::I16 | NativeType::U16 => 2,
            NativeType::I32 | NativeType::U32 | NativeType::F32 => 4,
            NativeType::I64 | NativeType::U64 | NativeType::F64 => 8,
            NativeType::ISize | NativeType::USize | NativeType::Pointer => pointer_size,
        }
    }

    /// Returns `true` for the pointer tag.
    #[must_use]
    pub fn is_pointer(self) -> bool {
        self == NativeType::Pointer
    }
}

/// A value passed to or returned from a bound native function.
///
/// Every variant carries its exact width. [`NativeValue::Null`] is accepted as an
/// argument for pointer parameters and is normalized to a null
/// [`NativeValue::Pointer`] before the host sees it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NativeValue {
    /// No value (void return)
    Void,
    /// Null/undefined argument, normalized to a null pointer before dispatch
    Null,
    /// `bool`
    Bool(bool),
    /// `int8`
    I8(i8),
    /// `uint8`
    U8(u8),
    /// `int16`
    I16(i16),
    /// `uint16`
    U16(u16),
    /// `int32`
    I32(i32),
    /// `uint32`
    U32(u32),
    /// `int64`
    I64(i64),
    /// `uint64`
    U64(u64),
    /// `float`
    F32(f32),
    /// `double`
    F64(f64),
    /// Pointer-sized signed integer
    ISize(i64),
    /// Pointer-sized unsigned integer
    USize(u64),
    /// Pointer or opaque handle
    Pointer(NativePtr),
}

impl NativeValue {
    /// The type tag matching this value, `None` for [`NativeValue::Null`].
    #[must_use]
    pub fn native_type(&self) -> Option<NativeType> {
        Some(match self {
            NativeValue::Void => NativeType::Void,
            NativeValue::Null => return None,
            NativeValue::Bool(_) => NativeType::Bool,
            NativeValue::I8(_) => NativeType::I8,
            NativeValue::U8(_) => NativeType::U8,
            NativeValue::I16(_) => NativeType::I16,
            NativeValue::U16(_) => NativeType::U16,
            NativeValue::I32(_) => NativeType::I32,
            NativeValue::U32(_) => NativeType::U32,
            NativeValue::I64(_) => NativeType::I64,
            NativeValue::U64(_) => NativeType::U64,
            NativeValue::F32(_) => NativeType::F32,
            NativeValue::F64(_) => NativeType::F64,
            NativeValue::ISize(_) => NativeType::ISize,
            NativeValue::USize(_) => NativeType::USize,
            NativeValue::Pointer(_) => NativeType::Pointer,
        })
    }

    /// Returns `true` if this value may be passed for a parameter of type `ty`.
    #[must_use]
    pub fn fits(&self, ty: NativeType) -> bool {
        match self {
            NativeValue::Null => ty == NativeType::Pointer,
            other => other.native_type() == Some(ty),
        }
    }

    /// Returns the pointer carried by this value.
    ///
    /// [`NativeValue::Null`] yields [`NativePtr::NULL`]; pointer-sized integers are
    /// reinterpreted as addresses.
    #[must_use]
    pub fn as_pointer(&self) -> Option<NativePtr> {
        match self {
            NativeValue::Pointer(ptr) => Some(*ptr),
            NativeValue::Null => Some(NativePtr::NULL),
            NativeValue::USize(v) => Some(NativePtr::new(*v)),
            NativeValue::ISize(v) => Some(NativePtr::new(v.cast_unsigned())),
            _ => None,
        }
    }

    /// Returns the value as a sign-correct 64-bit integer, for integral variants.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeValue::Bool(v) => Some(i64::from(*v)),
            NativeValue::I8(v) => Some(i64::from(*v)),
            NativeValue::U8(v) => Some(i64::from(*v)),
            NativeValue::I16(v) => Some(i64::from(*v)),
            NativeValue::U16(v) => Some(i64::from(*v)),
            NativeValue::I32(v) => Some(i64::from(*v)),
            NativeValue::U32(v) => Some(i64::from(*v)),
            NativeValue::I64(v) | NativeValue::ISize(v) => Some(*v),
            NativeValue::U64(v) | NativeValue::USize(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns `true` for a C truthy integral value.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            NativeValue::Pointer(ptr) => !ptr.is_null(),
            other => other.as_i64().is_some_and(|v| v != 0),
        }
    }

    /// Returns a null value for parameters of type `ty`; used to pad missing arguments.
    #[must_use]
    pub fn zero(ty: NativeType) -> Self {
        match ty {
            NativeType::Void => NativeValue::Void,
            NativeType::Bool => NativeValue::Bool(false),
            NativeType::I8 => NativeValue::I8(0),
            NativeType::U8 => NativeValue::U8(0),
            NativeType::I16 => NativeValue::I16(0),
            NativeType::U16 => NativeValue::U16(0),
            NativeType::I32 => NativeValue::I32(0),
            NativeType::U32 => NativeValue::U32(0),
            NativeType::I64 => NativeValue::I64(0),
            NativeType::U64 => NativeValue::U64(0),
            NativeType::F32 => NativeValue::F32(0.0),
            NativeType::F64 => NativeValue::F64(0.0),
            NativeType::ISize => NativeValue::ISize(0),
            NativeType::USize => NativeValue::USize(0),
            NativeType::Pointer => NativeValue::Pointer(NativePtr::NULL),
        }
    }
}

impl From<NativePtr> for NativeValue {
    fn from(ptr: NativePtr) -> Self {
        NativeValue::Pointer(ptr)
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::I32(value)
    }
}

impl From<u32> for NativeValue {
    fn from(value: u32) -> Self {
        NativeValue::U32(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(NativeValue::Null, Into::into)
    }
}
