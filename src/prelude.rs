//! # monoscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the monoscope library. Import this module to get quick access to everything
//! needed to attach to a runtime and invoke managed code.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all monoscope operations
pub use crate::Error;

/// The result type used throughout monoscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Runtime facade and bound managed method
pub use crate::{MonoApi, MonoMethod};

/// Configuration containers and presets
pub use crate::config::{AttributeConfig, Int64Mode, InvokeConfig, MonoApiConfig, ResolverConfig};

// ================================================================================================
// Host Environment
// ================================================================================================

/// Addresses, raw values and the environment abstraction
pub use crate::host::{
    ExportEntry, HostEnvironment, NativeFunction, NativePtr, NativeType, NativeValue,
};

/// In-process environment for tests and tooling
pub use crate::host::simulated::SimulatedHost;

// ================================================================================================
// Resolution and Binding
// ================================================================================================

/// Export signatures
pub use crate::signatures::{ExportSignature, SignatureTable};

/// Symbol resolution
pub use crate::resolver::{ResolutionStage, ResolveStages, SymbolResolver};

/// Typed callables
pub use crate::binder::{BoundFunction, NativeBinder};

/// Thread attachment
pub use crate::thread::ThreadAttachment;

// ================================================================================================
// Invocation and Marshalling
// ================================================================================================

/// Values crossing the managed boundary
pub use crate::invoke::{FromManagedValue, HostValue, ManagedValue};

/// Managed type descriptions
pub use crate::invoke::{ElementType, ManagedKind, ManagedType, MethodSignature, PrimitiveKind};

/// The invocation engine
pub use crate::invoke::Invoker;

// ================================================================================================
// Custom Attributes
// ================================================================================================

/// Attribute decoding
pub use crate::attributes::{
    CustomAttributeArgument, CustomAttributeDecoder, CustomAttributeNamedArgument,
    CustomAttributeRecord,
};
