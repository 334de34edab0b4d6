use std::fmt;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::host::{NativePtr, NativeType};

/// `MONO_TYPE_*` element codes as reported by `mono_type_get_type`.
///
/// The values are the ECMA-335 `ELEMENT_TYPE_*` codes, which Mono uses verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ElementType {
    End = 0x00,
    Void = 0x01,
    Boolean = 0x02,
    Char = 0x03,
    I1 = 0x04,
    U1 = 0x05,
    I2 = 0x06,
    U2 = 0x07,
    I4 = 0x08,
    U4 = 0x09,
    I8 = 0x0a,
    U8 = 0x0b,
    R4 = 0x0c,
    R8 = 0x0d,
    String = 0x0e,
    Ptr = 0x0f,
    ByRef = 0x10,
    ValueType = 0x11,
    Class = 0x12,
    Var = 0x13,
    Array = 0x14,
    GenericInst = 0x15,
    TypedByRef = 0x16,
    I = 0x18,
    U = 0x19,
    FnPtr = 0x1b,
    Object = 0x1c,
    SzArray = 0x1d,
    MVar = 0x1e,
}

impl ElementType {
    /// Maps a raw element code, `None` for codes that never describe a value.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0x00 => ElementType::End,
            0x01 => ElementType::Void,
            0x02 => ElementType::Boolean,
            0x03 => ElementType::Char,
            0x04 => ElementType::I1,
            0x05 => ElementType::U1,
            0x06 => ElementType::I2,
            0x07 => ElementType::U2,
            0x08 => ElementType::I4,
            0x09 => ElementType::U4,
            0x0a => ElementType::I8,
            0x0b => ElementType::U8,
            0x0c => ElementType::R4,
            0x0d => ElementType::R8,
            0x0e => ElementType::String,
            0x0f => ElementType::Ptr,
            0x10 => ElementType::ByRef,
            0x11 => ElementType::ValueType,
            0x12 => ElementType::Class,
            0x13 => ElementType::Var,
            0x14 => ElementType::Array,
            0x15 => ElementType::GenericInst,
            0x16 => ElementType::TypedByRef,
            0x18 => ElementType::I,
            0x19 => ElementType::U,
            0x1b => ElementType::FnPtr,
            0x1c => ElementType::Object,
            0x1d => ElementType::SzArray,
            0x1e => ElementType::MVar,
            _ => return None,
        })
    }

    /// The raw element code.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The primitive stored by this element type, if it is one.
    #[must_use]
    pub fn primitive(self) -> Option<PrimitiveKind> {
        Some(match self {
            ElementType::Boolean => PrimitiveKind::Boolean,
            ElementType::Char => PrimitiveKind::Char,
            ElementType::I1 => PrimitiveKind::I8,
            ElementType::U1 => PrimitiveKind::U8,
            ElementType::I2 => PrimitiveKind::I16,
            ElementType::U2 => PrimitiveKind::U16,
            ElementType::I4 => PrimitiveKind::I32,
            ElementType::U4 => PrimitiveKind::U32,
            ElementType::I8 => PrimitiveKind::I64,
            ElementType::U8 => PrimitiveKind::U64,
            ElementType::R4 => PrimitiveKind::F32,
            ElementType::R8 => PrimitiveKind::F64,
            ElementType::I => PrimitiveKind::ISize,
            ElementType::U => PrimitiveKind::USize,
            _ => return None,
        })
    }
}

/// A primitive managed value type.
///
/// The string forms are the C# keyword spellings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum PrimitiveKind {
    /// `System.Boolean`, one byte
    #[strum(serialize = "bool")]
    Boolean,
    /// `System.Char`, one UTF-16 code unit
    #[strum(serialize = "char")]
    Char,
    /// `System.SByte`
    #[strum(serialize = "sbyte")]
    I8,
    /// `System.Byte`
    #[strum(serialize = "byte")]
    U8,
    /// `System.Int16`
    #[strum(serialize = "short")]
    I16,
    /// `System.UInt16`
    #[strum(serialize = "ushort")]
    U16,
    /// `System.Int32`
    #[strum(serialize = "int")]
    I32,
    /// `System.UInt32`
    #[strum(serialize = "uint")]
    U32,
    /// `System.Int64`
    #[strum(serialize = "long")]
    I64,
    /// `System.UInt64`
    #[strum(serialize = "ulong")]
    U64,
    /// `System.Single`
    #[strum(serialize = "float")]
    F32,
    /// `System.Double`
    #[strum(serialize = "double")]
    F64,
    /// `System.IntPtr`
    #[strum(serialize = "nint")]
    ISize,
    /// `System.UIntPtr`
    #[strum(serialize = "nuint")]
    USize,
}

impl PrimitiveKind {
    /// The native storage tag of this primitive.
    #[must_use]
    pub fn native_type(self) -> NativeType {
        match self {
            PrimitiveKind::Boolean => NativeType::Bool,
            PrimitiveKind::Char | PrimitiveKind::U16 => NativeType::U16,
            PrimitiveKind::I8 => NativeType::I8,
            PrimitiveKind::U8 => NativeType::U8,
            PrimitiveKind::I16 => NativeType::I16,
            PrimitiveKind::I32 => NativeType::I32,
            PrimitiveKind::U32 => NativeType::U32,
            PrimitiveKind::I64 => NativeType::I64,
            PrimitiveKind::U64 => NativeType::U64,
            PrimitiveKind::F32 => NativeType::F32,
            PrimitiveKind::F64 => NativeType::F64,
            PrimitiveKind::ISize => NativeType::ISize,
            PrimitiveKind::USize => NativeType::USize,
        }
    }

    /// Storage size in bytes for the given pointer width.
    #[must_use]
    pub fn size(self, pointer_size: usize) -> usize {
        self.native_type().size(pointer_size)
    }

    /// Name of the runtime export returning this primitive's `MonoClass*`.
    #[must_use]
    pub fn class_getter(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "mono_get_boolean_class",
            PrimitiveKind::Char => "mono_get_char_class",
            PrimitiveKind::I8 => "mono_get_sbyte_class",
            PrimitiveKind::U8 => "mono_get_byte_class",
            PrimitiveKind::I16 => "mono_get_int16_class",
            PrimitiveKind::U16 => "mono_get_uint16_class",
            PrimitiveKind::I32 => "mono_get_int32_class",
            PrimitiveKind::U32 => "mono_get_uint32_class",
            PrimitiveKind::I64 => "mono_get_int64_class",
            PrimitiveKind::U64 => "mono_get_uint64_class",
            PrimitiveKind::F32 => "mono_get_single_class",
            PrimitiveKind::F64 => "mono_get_double_class",
            PrimitiveKind::ISize => "mono_get_intptr_class",
            PrimitiveKind::USize => "mono_get_uintptr_class",
        }
    }
}

/// How values of a managed type are marshalled and unboxed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManagedKind {
    /// `System.Void`
    Void,
    /// A primitive value type
    Primitive(PrimitiveKind),
    /// An enum, stored as its underlying primitive
    Enum(PrimitiveKind),
    /// Any other value type; kept boxed
    ValueType,
    /// `System.String`
    String,
    /// Classes, arrays, interfaces and generic parameters
    Reference,
    /// Unmanaged and function pointers
    Pointer,
}

impl fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagedKind::Void => write!(f, "void"),
            ManagedKind::Primitive(kind) => write!(f, "{kind}"),
            ManagedKind::Enum(kind) => write!(f, "enum : {kind}"),
            ManagedKind::ValueType => write!(f, "struct"),
            ManagedKind::String => write!(f, "string"),
            ManagedKind::Reference => write!(f, "object"),
            ManagedKind::Pointer => write!(f, "pointer"),
        }
    }
}

/// A parameter or return type of a managed method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ManagedType {
    /// The raw `MonoType*`
    pub handle: NativePtr,
    /// The element code, `None` for codes this crate does not know
    pub element: Option<ElementType>,
    /// Marshalling classification
    pub kind: ManagedKind,
    /// Whether the type is passed by reference (`ref`/`out`)
    pub byref: bool,
    /// The `MonoClass*` of the type, null when not resolvable
    pub class: NativePtr,
}

impl ManagedType {
    /// Creates a by-value type without handles, mostly useful in tests.
    #[must_use]
    pub fn of(kind: ManagedKind) -> Self {
        ManagedType {
            handle: NativePtr::NULL,
            element: None,
            kind,
            byref: false,
            class: NativePtr::NULL,
        }
    }

    /// Returns `true` if the parameter expects a pointer rather than a value.
    ///
    /// Primitive host values cannot be passed for such parameters.
    #[must_use]
    pub fn is_reference_like(&self) -> bool {
        self.byref
            || matches!(
                self.kind,
                ManagedKind::String | ManagedKind::Reference | ManagedKind::Pointer
            )
    }

    /// Returns `true` if host text can be converted into a managed string for this type.
    #[must_use]
    pub fn accepts_text(&self) -> bool {
        !self.byref && matches!(self.kind, ManagedKind::String | ManagedKind::Reference)
    }

    /// The primitive stored by this type, including an enum's underlying type.
    #[must_use]
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            ManagedKind::Primitive(kind) | ManagedKind::Enum(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.byref {
            write!(f, "ref {}", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// Parameter and return types of a managed method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSignature {
    /// Parameter types in declaration order
    pub params: Vec<ManagedType>,
    /// Return type
    pub ret: ManagedType,
}

impl MethodSignature {
    /// Number of declared parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}
