//! Lazily bound, signature-checked native callables.
//!
//! [`NativeBinder`] turns a logical export name into a [`BoundFunction`]: it
//! resolves the address, looks up the declared [`ExportSignature`], asks the host
//! to bind the pair, and memoizes the result. Every later use of the same name
//! returns the same `Arc` without touching the resolver or the host again.
//!
//! [`BoundFunction::invoke`] validates arguments against the declared parameter
//! types before anything reaches the host. Calling a native function with the
//! wrong arity or a wrong-width value corrupts the callee's stack frame, so the
//! check is never skipped.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::{
    host::{NativeFunction, NativePtr, NativeType, NativeValue},
    resolver::SymbolResolver,
    signatures::ExportSignature,
    Error, Result,
};

/// A native export bound to its declared signature.
pub struct BoundFunction {
    address: NativePtr,
    signature: Arc<ExportSignature>,
    function: Arc<dyn NativeFunction>,
}

impl BoundFunction {
    /// Calls the export after checking `args` against the declared parameters.
    ///
    /// [`NativeValue::Null`] is accepted for pointer parameters and passed as a
    /// null pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentMarshal`] on an arity or type mismatch, or the
    /// host's error if the native call fails.
    pub fn invoke(&self, args: &[NativeValue]) -> Result<NativeValue> {
        let params = &self.signature.params;
        if args.len() != params.len() {
            return Err(marshal_error!(
                self.signature.name,
                args.len().min(params.len()),
                "expected {} arguments, got {}",
                params.len(),
                args.len()
            ));
        }

        let mut normalized = Vec::with_capacity(args.len());
        for (index, (arg, ty)) in args.iter().zip(params).enumerate() {
            if !arg.fits(*ty) {
                return Err(marshal_error!(
                    self.signature.name,
                    index,
                    "declared {}, got {:?}",
                    ty,
                    arg
                ));
            }
            normalized.push(match arg {
                NativeValue::Null => NativeValue::Pointer(NativePtr::NULL),
                other => *other,
            });
        }

        self.function.call(&normalized)
    }

    /// Calls the export and expects a pointer result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueConversion`] if the export is not declared to return
    /// a pointer, plus every error of [`invoke`](Self::invoke).
    pub fn invoke_pointer(&self, args: &[NativeValue]) -> Result<NativePtr> {
        match self.invoke(args)? {
            NativeValue::Pointer(ptr) => Ok(ptr),
            other => Err(Error::ValueConversion {
                expected: "pointer",
                found: value_kind(&other),
            }),
        }
    }

    /// Logical name of the export.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Resolved address of the export.
    #[must_use]
    pub fn address(&self) -> NativePtr {
        self.address
    }

    /// Declared signature of the export.
    #[must_use]
    pub fn signature(&self) -> &ExportSignature {
        &self.signature
    }

    /// Declared return type.
    #[must_use]
    pub fn ret(&self) -> NativeType {
        self.signature.ret
    }

    /// Declared parameter types.
    #[must_use]
    pub fn params(&self) -> &[NativeType] {
        &self.signature.params
    }
}

/// Name of the variant of `value`, for conversion errors.
pub(crate) fn value_kind(value: &NativeValue) -> &'static str {
    match value {
        NativeValue::Void => "void",
        NativeValue::Null => "null",
        NativeValue::Bool(_) => "bool",
        NativeValue::I8(_) => "int8",
        NativeValue::U8(_) => "uint8",
        NativeValue::I16(_) => "int16",
        NativeValue::U16(_) => "uint16",
        NativeValue::I32(_) => "int",
        NativeValue::U32(_) => "uint",
        NativeValue::I64(_) => "int64",
        NativeValue::U64(_) => "uint64",
        NativeValue::F32(_) => "float",
        NativeValue::F64(_) => "double",
        NativeValue::ISize(_) => "long",
        NativeValue::USize(_) => "size_t",
        NativeValue::Pointer(_) => "pointer",
    }
}

/// Memoizing factory of [`BoundFunction`]s.
pub struct NativeBinder {
    resolver: Arc<SymbolResolver>,
    bound: DashMap<String, Arc<BoundFunction>>,
}

impl NativeBinder {
    /// Creates a binder on top of `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<SymbolResolver>) -> Self {
        NativeBinder {
            resolver,
            bound: DashMap::new(),
        }
    }

    /// Returns the bound callable for `name`, binding it on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::SymbolResolution`] if the export cannot be found
    /// - [`Error::SignatureNotFound`] if no signature is declared for `name`
    /// - the host's error if binding fails
    pub fn callable(&self, name: &str) -> Result<Arc<BoundFunction>> {
        if let Some(bound) = self.bound.get(name) {
            return Ok(Arc::clone(bound.value()));
        }

        let address = self.resolver.resolve(name)?;
        let signature = self
            .resolver
            .signatures()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SignatureNotFound(name.to_string()))?;

        let function = self
            .resolver
            .host()
            .bind(address, signature.ret, &signature.params)?;
        trace!(target: "monoscope::binder", name, %address, "bound export");

        let bound = Arc::new(BoundFunction {
            address,
            signature,
            function,
        });
        Ok(Arc::clone(
            self.bound.entry(name.to_string()).or_insert(bound).value(),
        ))
    }

    /// Binds `name` (if needed) and calls it with `args`.
    ///
    /// # Errors
    ///
    /// Every error of [`callable`](Self::callable) and [`BoundFunction::invoke`].
    pub fn call(&self, name: &str, args: &[NativeValue]) -> Result<NativeValue> {
        self.callable(name)?.invoke(args)
    }

    /// Binds `name` (if needed), calls it and expects a pointer result.
    ///
    /// # Errors
    ///
    /// Every error of [`callable`](Self::callable) and [`BoundFunction::invoke_pointer`].
    pub fn call_pointer(&self, name: &str, args: &[NativeValue]) -> Result<NativePtr> {
        self.callable(name)?.invoke_pointer(args)
    }

    /// Returns `true` if `name` can be resolved. Never fails.
    #[must_use]
    pub fn has_export(&self, name: &str) -> bool {
        self.resolver.has_export(name)
    }

    /// Number of memoized callables.
    #[must_use]
    pub fn bound_len(&self) -> usize {
        self.bound.len()
    }

    /// The resolver backing this binder.
    #[must_use]
    pub fn resolver(&self) -> &Arc<SymbolResolver> {
        &self.resolver
    }
}
