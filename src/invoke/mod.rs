//! Managed method invocation and value marshalling.
//!
//! [`Invoker`] drives `mono_runtime_invoke`, the runtime's universal entry point.
//! A call runs through these steps:
//!
//! 1. Attach the calling thread (see [`crate::thread`]).
//! 2. Resolve the method's [`MethodSignature`], once per method handle.
//! 3. Validate every [`HostValue`] against its declared parameter type. Nothing
//!    touches the runtime until all arguments have been accepted.
//! 4. Marshal the arguments into a per-call [`ScratchArena`]: primitives are
//!    written at their exact width into slots at least one pointer wide, text
//!    becomes a `System.String`, handles pass through.
//! 5. Clear the exception slot and call `mono_runtime_invoke`.
//! 6. Convert a non-null exception slot into [`Error::ManagedInvocation`].
//!
//! [`Invoker::call_value`] additionally unboxes the result by the declared
//! return type into a [`ManagedValue`].
//!
//! # Exception slot
//!
//! `mono_runtime_invoke` reports managed exceptions through an out parameter.
//! The invoker owns one pointer-wide cell for this and guards it with a
//! reentrancy flag: a second call while one is in flight (for example from a
//! hook running inside the managed method) fails with
//! [`Error::ReentrantInvocation`] instead of clobbering the first call's slot.

mod marshal;
mod types;
mod unbox;

pub use marshal::{encode_primitive, HostValue, ScratchArena};
pub use types::{ElementType, ManagedKind, ManagedType, MethodSignature, PrimitiveKind};
pub use unbox::{FromManagedValue, ManagedValue};

pub use crate::config::Int64Mode;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

use dashmap::DashMap;
use tracing::{debug, trace};
use widestring::U16Str;

use crate::{
    binder::NativeBinder,
    config::InvokeConfig,
    host::{io, HostEnvironment, NativePtr, NativeValue},
    thread::ThreadAttachment,
    Error, Result,
};

/// Pointer-wide out parameter receiving managed exceptions.
struct ExceptionSlot {
    host: Arc<dyn HostEnvironment>,
    cell: OnceLock<NativePtr>,
    busy: AtomicBool,
}

/// Exclusive use of the exception slot for one call.
struct SlotGuard<'a> {
    slot: &'a ExceptionSlot,
    cell: NativePtr,
}

impl ExceptionSlot {
    fn new(host: Arc<dyn HostEnvironment>) -> Self {
        ExceptionSlot {
            host,
            cell: OnceLock::new(),
            busy: AtomicBool::new(false),
        }
    }

    /// Claims the slot and clears it.
    fn enter(&self, method: impl FnOnce() -> String) -> Result<SlotGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(Error::ReentrantInvocation(method()));
        }

        // The guard releases the flag on every path from here on
        let mut guard = SlotGuard {
            slot: self,
            cell: NativePtr::NULL,
        };

        guard.cell = match self.cell.get() {
            Some(cell) => *cell,
            None => {
                let cell = self.host.alloc(self.host.pointer_size())?;
                *self.cell.get_or_init(|| cell)
            }
        };
        io::write_pointer(self.host.as_ref(), guard.cell, NativePtr::NULL)?;
        Ok(guard)
    }
}

impl SlotGuard<'_> {
    fn cell(&self) -> NativePtr {
        self.cell
    }

    fn exception(&self) -> Result<NativePtr> {
        io::read_pointer(self.slot.host.as_ref(), self.cell)
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

impl Drop for ExceptionSlot {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.get() {
            if let Err(error) = self.host.free(*cell) {
                debug!(
                    target: "monoscope::invoke",
                    %cell,
                    %error,
                    "failed to release exception slot"
                );
            }
        }
    }
}

/// Invokes managed methods and converts values in both directions.
pub struct Invoker {
    binder: Arc<NativeBinder>,
    threads: Arc<ThreadAttachment>,
    config: InvokeConfig,
    signatures: DashMap<NativePtr, Arc<MethodSignature>>,
    slot: ExceptionSlot,
}

impl Invoker {
    /// Creates an invoker on top of a binder and thread guard.
    #[must_use]
    pub fn new(
        binder: Arc<NativeBinder>,
        threads: Arc<ThreadAttachment>,
        config: InvokeConfig,
    ) -> Self {
        let host = Arc::clone(binder.resolver().host());
        Invoker {
            binder,
            threads,
            config,
            signatures: DashMap::new(),
            slot: ExceptionSlot::new(host),
        }
    }

    /// Invokes `method` and returns the raw result object.
    ///
    /// Value-type results come back boxed, exactly as `mono_runtime_invoke`
    /// produces them; use [`call_value`](Self::call_value) to unbox.
    ///
    /// # Arguments
    ///
    /// * `method` - The `MonoMethod*` to call
    /// * `instance` - The `this` object, or [`NativePtr::NULL`] for static methods
    /// * `args` - Arguments in declaration order; missing trailing ones are null
    ///
    /// # Errors
    ///
    /// - [`Error::ArgumentMarshal`] if an argument does not fit its parameter, or the
    ///   argument count is wrong
    /// - [`Error::ManagedInvocation`] if the method throws and
    ///   [`InvokeConfig::throw_on_managed_exception`] is set; otherwise a thrown
    ///   exception yields [`NativePtr::NULL`]
    /// - [`Error::ReentrantInvocation`] if another call is still in flight
    /// - resolution and host errors of the runtime exports involved
    pub fn invoke(
        &self,
        method: NativePtr,
        instance: NativePtr,
        args: &[HostValue],
    ) -> Result<NativePtr> {
        Ok(self.dispatch(method, instance, args)?.unwrap_or(NativePtr::NULL))
    }

    /// Invokes `method` and unboxes the result by its declared return type.
    ///
    /// A suppressed managed exception yields [`ManagedValue::Null`].
    ///
    /// # Errors
    ///
    /// Every error of [`invoke`](Self::invoke), plus errors reading the result.
    pub fn call_value(
        &self,
        method: NativePtr,
        instance: NativePtr,
        args: &[HostValue],
    ) -> Result<ManagedValue> {
        let signature = self.signature(method)?;
        match self.dispatch(method, instance, args)? {
            Some(result) => self.unbox_result(&signature.ret, result),
            None => Ok(ManagedValue::Null),
        }
    }

    /// Invokes `method` and converts the result into `T`.
    ///
    /// # Errors
    ///
    /// Every error of [`call_value`](Self::call_value), and
    /// [`Error::ValueConversion`] if the result does not convert into `T`.
    pub fn call<T: FromManagedValue>(
        &self,
        method: NativePtr,
        instance: NativePtr,
        args: &[HostValue],
    ) -> Result<T> {
        T::from_managed(self.call_value(method, instance, args)?)
    }

    /// Returns the parameter and return types of `method`, resolving them once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NullResult`] if the runtime has no signature for the
    /// method, or errors of the runtime exports involved.
    pub fn signature(&self, method: NativePtr) -> Result<Arc<MethodSignature>> {
        if let Some(signature) = self.signatures.get(&method) {
            return Ok(Arc::clone(signature.value()));
        }
        if method.is_null() {
            return Err(Error::InvalidPointer {
                address: 0,
                reason: "null method handle",
            });
        }

        self.threads.ensure_attached(None)?;
        let signature = Arc::new(self.read_signature(method)?);
        trace!(
            target: "monoscope::invoke",
            %method,
            arity = signature.arity(),
            ret = %signature.ret,
            "resolved method signature"
        );
        Ok(Arc::clone(
            self.signatures.entry(method).or_insert(signature).value(),
        ))
    }

    /// Boxes a primitive into a new managed object.
    ///
    /// # Errors
    ///
    /// - [`Error::ArgumentMarshal`] if `value` does not fit `kind`
    /// - [`Error::NullResult`] if the runtime has no class for `kind` or boxing fails
    pub fn box_primitive(&self, kind: PrimitiveKind, value: &HostValue) -> Result<NativePtr> {
        let pointer_size = self.host().pointer_size();
        let native = encode_primitive(kind, value, pointer_size)
            .map_err(|reason| marshal_error!(format!("box {kind}"), 0, reason))?;

        let domain = self.threads.ensure_attached(None).and_then(|_| self.threads.root_domain())?;
        let getter = kind.class_getter();
        let class = self.binder.call_pointer(getter, &[])?;
        if class.is_null() {
            return Err(Error::NullResult(getter.to_string()));
        }
        self.binder.call("mono_class_init", &[NativeValue::Pointer(class)])?;

        let mut arena = ScratchArena::new(Arc::clone(self.host()));
        let data = arena.store(&native)?;
        let boxed = self.binder.call_pointer(
            "mono_value_box",
            &[
                NativeValue::Pointer(domain),
                NativeValue::Pointer(class),
                NativeValue::Pointer(data),
            ],
        )?;
        if boxed.is_null() {
            return Err(Error::NullResult("mono_value_box".to_string()));
        }
        Ok(boxed)
    }

    /// Reads the primitive stored in a boxed object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPointer`] for a null handle, or errors of
    /// `mono_object_unbox` and the memory read.
    pub fn unbox_value(&self, handle: NativePtr, kind: PrimitiveKind) -> Result<ManagedValue> {
        if handle.is_null() {
            return Err(Error::InvalidPointer {
                address: 0,
                reason: "cannot unbox a null object",
            });
        }

        let data = self
            .binder
            .call_pointer("mono_object_unbox", &[NativeValue::Pointer(handle)])?;
        if data.is_null() {
            return Err(Error::NullResult("mono_object_unbox".to_string()));
        }

        let native = io::read_value(self.host().as_ref(), data, kind.native_type())?;
        ManagedValue::from_native(kind, native, self.config.int64_mode)
    }

    /// Copies a `System.String` into the host.
    ///
    /// A null string reads as empty. Uses `mono_string_to_utf8` when exported and
    /// decodes the UTF-16 buffer directly otherwise.
    ///
    /// # Errors
    ///
    /// Returns errors of the runtime exports involved or of the memory read.
    pub fn read_managed_string(&self, string: NativePtr) -> Result<String> {
        if string.is_null() {
            return Ok(String::new());
        }

        if self.binder.has_export("mono_string_to_utf8") {
            let utf8 = self
                .binder
                .call_pointer("mono_string_to_utf8", &[NativeValue::Pointer(string)])?;
            if utf8.is_null() {
                return Ok(String::new());
            }

            let text = io::read_c_string(self.host().as_ref(), utf8);
            if let Err(error) = self.binder.call("mono_free", &[NativeValue::Pointer(utf8)]) {
                debug!(
                    target: "monoscope::invoke",
                    %utf8,
                    %error,
                    "failed to free converted string"
                );
            }
            return text;
        }

        let chars = self
            .binder
            .call_pointer("mono_string_chars", &[NativeValue::Pointer(string)])?;
        let length = self
            .binder
            .call("mono_string_length", &[NativeValue::Pointer(string)])?
            .as_i64()
            .and_then(|length| usize::try_from(length).ok())
            .unwrap_or(0);
        if chars.is_null() || length == 0 {
            return Ok(String::new());
        }

        let bytes = self.host().read(chars, length * 2)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
            .collect();
        Ok(U16Str::from_slice(&units).to_string_lossy())
    }

    /// Returns the name of `method`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NullResult`] if the runtime reports no name.
    pub fn method_name(&self, method: NativePtr) -> Result<String> {
        let name = self
            .binder
            .call_pointer("mono_method_get_name", &[NativeValue::Pointer(method)])?;
        if name.is_null() {
            return Err(Error::NullResult("mono_method_get_name".to_string()));
        }
        io::read_c_string(self.host().as_ref(), name)
    }

    /// Instantiates a generic method over concrete type arguments.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`]: building a generic context needs
    /// runtime internals that differ between builds.
    pub fn inflate_generic_method(
        &self,
        _method: NativePtr,
        _type_args: &[NativePtr],
    ) -> Result<NativePtr> {
        Err(Error::NotSupported("generic method instantiation"))
    }

    /// The configuration this invoker was created with.
    #[must_use]
    pub fn config(&self) -> &InvokeConfig {
        &self.config
    }

    /// The binder backing this invoker.
    #[must_use]
    pub fn binder(&self) -> &Arc<NativeBinder> {
        &self.binder
    }

    fn host(&self) -> &Arc<dyn HostEnvironment> {
        self.binder.resolver().host()
    }

    /// Runs one call; `None` means a managed exception was suppressed.
    fn dispatch(
        &self,
        method: NativePtr,
        instance: NativePtr,
        args: &[HostValue],
    ) -> Result<Option<NativePtr>> {
        self.threads.ensure_attached(None)?;
        let signature = self.signature(method)?;

        self.check_arguments(method, &signature, args)?;

        let mut arena = ScratchArena::new(Arc::clone(self.host()));
        let mut slots = Vec::with_capacity(signature.arity());
        for (index, param) in signature.params.iter().enumerate() {
            let value = args.get(index).unwrap_or(&HostValue::Null);
            slots.push(self.marshal_argument(&mut arena, param, value)?);
        }
        let array = arena.store_pointers(&slots)?;

        let guard = self.slot.enter(|| self.method_label(method))?;
        let result = self.binder.call_pointer(
            "mono_runtime_invoke",
            &[
                NativeValue::Pointer(method),
                NativeValue::Pointer(instance),
                NativeValue::Pointer(array),
                NativeValue::Pointer(guard.cell()),
            ],
        )?;
        let exception = guard.exception()?;
        drop(guard);

        if exception.is_null() {
            return Ok(Some(result));
        }

        let error = self.managed_error(method, exception);
        if self.config.throw_on_managed_exception {
            return Err(error);
        }
        debug!(target: "monoscope::invoke", %error, "suppressed managed exception");
        Ok(None)
    }

    /// Validates arity and every argument before anything is marshalled.
    fn check_arguments(
        &self,
        method: NativePtr,
        signature: &MethodSignature,
        args: &[HostValue],
    ) -> Result<()> {
        let arity = signature.arity();
        if args.len() > arity || (self.config.strict_arity && args.len() < arity) {
            return Err(marshal_error!(
                self.method_label(method),
                args.len().min(arity),
                "expected {} arguments, got {}",
                arity,
                args.len()
            ));
        }

        let pointer_size = self.host().pointer_size();
        for (index, (value, param)) in args.iter().zip(&signature.params).enumerate() {
            let reason = match value {
                HostValue::Null | HostValue::Handle(_) => None,
                HostValue::Text(_) if param.accepts_text() => None,
                HostValue::Text(_) => Some(format!("text cannot be passed as {param}")),
                primitive if param.is_reference_like() => Some(format!(
                    "{} cannot be passed as {param}",
                    primitive.kind_name()
                )),
                primitive => match param.primitive() {
                    Some(kind) => encode_primitive(kind, primitive, pointer_size).err(),
                    None => Some(format!(
                        "{} cannot be passed as {param}; pass a boxed handle",
                        primitive.kind_name()
                    )),
                },
            };

            if let Some(reason) = reason {
                return Err(marshal_error!(self.method_label(method), index, reason));
            }
        }
        Ok(())
    }

    /// Produces the `void*` passed in the argument array for one parameter.
    fn marshal_argument(
        &self,
        arena: &mut ScratchArena,
        param: &ManagedType,
        value: &HostValue,
    ) -> Result<NativePtr> {
        match value {
            HostValue::Null => Ok(NativePtr::NULL),
            HostValue::Handle(handle) => Ok(*handle),
            HostValue::Text(text) => self.new_string(arena, text),
            primitive => {
                let Some(kind) = param.primitive() else {
                    return Err(Error::NotSupported(
                        "primitive argument for a non-primitive parameter",
                    ));
                };
                let native = encode_primitive(kind, primitive, self.host().pointer_size())
                    .map_err(|reason| marshal_error!(format!("{param}"), 0, reason))?;
                arena.store(&native)
            }
        }
    }

    fn new_string(&self, arena: &mut ScratchArena, text: &str) -> Result<NativePtr> {
        let domain = self.threads.root_domain()?;
        let utf8 = arena.store_c_string(text)?;
        let string = self.binder.call_pointer(
            "mono_string_new",
            &[NativeValue::Pointer(domain), NativeValue::Pointer(utf8)],
        )?;
        if string.is_null() {
            return Err(Error::NullResult("mono_string_new".to_string()));
        }
        Ok(string)
    }

    fn read_signature(&self, method: NativePtr) -> Result<MethodSignature> {
        let signature = self
            .binder
            .call_pointer("mono_method_signature", &[NativeValue::Pointer(method)])?;
        if signature.is_null() {
            return Err(Error::NullResult("mono_method_signature".to_string()));
        }

        let count = self
            .binder
            .call("mono_signature_get_param_count", &[NativeValue::Pointer(signature)])?
            .as_i64()
            .and_then(|count| usize::try_from(count).ok())
            .unwrap_or(0);

        let mut arena = ScratchArena::new(Arc::clone(self.host()));
        let iter = arena.store(&NativeValue::Pointer(NativePtr::NULL))?;
        let mut params = Vec::with_capacity(count);
        while params.len() < count {
            let param = self.binder.call_pointer(
                "mono_signature_get_params",
                &[NativeValue::Pointer(signature), NativeValue::Pointer(iter)],
            )?;
            if param.is_null() {
                return Err(malformed_error!(
                    "signature of {} declares {} parameters but yields {}",
                    method,
                    count,
                    params.len()
                ));
            }
            params.push(self.describe_type(param)?);
        }

        let ret = self
            .binder
            .call_pointer("mono_signature_get_return_type", &[NativeValue::Pointer(signature)])?;
        let ret = if ret.is_null() {
            ManagedType::of(ManagedKind::Void)
        } else {
            self.describe_type(ret)?
        };

        Ok(MethodSignature { params, ret })
    }

    fn describe_type(&self, handle: NativePtr) -> Result<ManagedType> {
        let element = self.element_type(handle)?;
        let byref = self
            .binder
            .call("mono_type_is_byref", &[NativeValue::Pointer(handle)])?
            .is_truthy();
        let class = self
            .binder
            .call_pointer("mono_class_from_mono_type", &[NativeValue::Pointer(handle)])?;

        let kind = match element {
            Some(ElementType::Void) => ManagedKind::Void,
            Some(ElementType::String) => ManagedKind::String,
            Some(ElementType::Ptr | ElementType::FnPtr | ElementType::ByRef) => {
                ManagedKind::Pointer
            }
            Some(ElementType::ValueType) => self.classify_value_type(class)?,
            Some(ElementType::GenericInst) if self.is_value_type(class)? => ManagedKind::ValueType,
            Some(element) => element
                .primitive()
                .map_or(ManagedKind::Reference, ManagedKind::Primitive),
            None => ManagedKind::Reference,
        };

        Ok(ManagedType {
            handle,
            element,
            kind,
            byref,
            class,
        })
    }

    fn element_type(&self, handle: NativePtr) -> Result<Option<ElementType>> {
        let code = self
            .binder
            .call("mono_type_get_type", &[NativeValue::Pointer(handle)])?
            .as_i64()
            .and_then(|code| i32::try_from(code).ok());
        Ok(code.and_then(ElementType::from_code))
    }

    /// Enums unbox as their underlying primitive; other structs stay boxed.
    fn classify_value_type(&self, class: NativePtr) -> Result<ManagedKind> {
        if class.is_null() {
            return Ok(ManagedKind::ValueType);
        }

        let is_enum = self
            .binder
            .call("mono_class_is_enum", &[NativeValue::Pointer(class)])?
            .is_truthy();
        if !is_enum {
            return Ok(ManagedKind::ValueType);
        }

        let base = self
            .binder
            .call_pointer("mono_class_enum_basetype", &[NativeValue::Pointer(class)])?;
        if base.is_null() {
            return Ok(ManagedKind::ValueType);
        }
        Ok(self
            .element_type(base)?
            .and_then(ElementType::primitive)
            .map_or(ManagedKind::ValueType, ManagedKind::Enum))
    }

    fn is_value_type(&self, class: NativePtr) -> Result<bool> {
        if class.is_null() || !self.binder.has_export("mono_class_is_valuetype") {
            return Ok(false);
        }
        Ok(self
            .binder
            .call("mono_class_is_valuetype", &[NativeValue::Pointer(class)])?
            .is_truthy())
    }

    fn unbox_result(&self, ret: &ManagedType, result: NativePtr) -> Result<ManagedValue> {
        if ret.kind == ManagedKind::Void {
            return Ok(ManagedValue::Void);
        }
        if ret.kind == ManagedKind::String && !ret.byref {
            return self.read_managed_string(result).map(ManagedValue::String);
        }
        if result.is_null() {
            return Ok(ManagedValue::Null);
        }
        if ret.byref {
            return Ok(ManagedValue::Object(result));
        }

        match ret.kind {
            ManagedKind::Primitive(kind) | ManagedKind::Enum(kind) => {
                self.unbox_value(result, kind)
            }
            // Unmanaged pointers come back as boxed IntPtr
            ManagedKind::Pointer => self.unbox_value(result, PrimitiveKind::USize),
            ManagedKind::ValueType => Ok(ManagedValue::Boxed(result)),
            _ => Ok(ManagedValue::Object(result)),
        }
    }

    fn managed_error(&self, method: NativePtr, exception: NativePtr) -> Error {
        let type_name = self
            .exception_type_name(exception)
            .map_err(|error| {
                debug!(
                    target: "monoscope::invoke",
                    %exception,
                    %error,
                    "exception type unavailable"
                );
            })
            .ok()
            .flatten();
        let message = self
            .exception_message(exception)
            .map_err(|error| {
                debug!(
                    target: "monoscope::invoke",
                    %exception,
                    %error,
                    "exception message unavailable"
                );
            })
            .ok()
            .flatten();

        Error::ManagedInvocation {
            method: self.method_label(method),
            exception,
            type_name,
            message,
        }
    }

    fn exception_type_name(&self, exception: NativePtr) -> Result<Option<String>> {
        let class = self
            .binder
            .call_pointer("mono_object_get_class", &[NativeValue::Pointer(exception)])?;
        if class.is_null() {
            return Ok(None);
        }
        class_full_name(&self.binder, class).map(Some)
    }

    /// Formats the exception through its `ToString`, which may throw in turn.
    fn exception_message(&self, exception: NativePtr) -> Result<Option<String>> {
        let mut arena = ScratchArena::new(Arc::clone(self.host()));
        let nested = arena.store(&NativeValue::Pointer(NativePtr::NULL))?;
        let string = self.binder.call_pointer(
            "mono_object_to_string",
            &[NativeValue::Pointer(exception), NativeValue::Pointer(nested)],
        )?;

        let thrown = io::read_pointer(self.host().as_ref(), nested)?;
        if !thrown.is_null() {
            debug!(target: "monoscope::invoke", %exception, %thrown, "exception ToString threw");
            return Ok(None);
        }
        if string.is_null() {
            return Ok(None);
        }
        self.read_managed_string(string).map(Some)
    }

    /// Method name for diagnostics, falling back to the handle.
    fn method_label(&self, method: NativePtr) -> String {
        self.method_name(method).unwrap_or_else(|_| method.to_string())
    }
}

/// Reads `Namespace.Name` of a class; types without a namespace yield the bare name.
fn class_full_name(binder: &NativeBinder, class: NativePtr) -> Result<String> {
    let (namespace, name) = class_name(binder, class)?;
    Ok(if namespace.is_empty() {
        name
    } else {
        format!("{namespace}.{name}")
    })
}

/// Reads the namespace and simple name of a class. The namespace is empty for
/// types in the global namespace.
pub(crate) fn class_name(binder: &NativeBinder, class: NativePtr) -> Result<(String, String)> {
    let host = binder.resolver().host().as_ref();
    let name = binder.call_pointer("mono_class_get_name", &[NativeValue::Pointer(class)])?;
    if name.is_null() {
        return Err(Error::NullResult("mono_class_get_name".to_string()));
    }
    let name = io::read_c_string(host, name)?;

    let namespace =
        binder.call_pointer("mono_class_get_namespace", &[NativeValue::Pointer(class)])?;
    let namespace = if namespace.is_null() {
        String::new()
    } else {
        io::read_c_string(host, namespace)?
    };
    Ok((namespace, name))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::test::{CallOutcome, FakeCall, FakeMono};

    fn invoker(mono: &FakeMono, config: InvokeConfig) -> Invoker {
        let binder = mono.binder();
        let threads = Arc::new(ThreadAttachment::new(Arc::clone(&binder)));
        Invoker::new(binder, threads, config)
    }

    fn negate_body() -> impl Fn(&FakeCall) -> CallOutcome + Send + Sync + 'static {
        |call| Ok(call.box_value(NativeValue::I32(-call.arg::<i32>(0))))
    }

    #[test]
    fn test_i32_roundtrip() {
        let mono = FakeMono::new();
        let int = mono.primitive_type(PrimitiveKind::I32);
        let method = mono.static_method("Negate", &[int], int, negate_body());
        let invoker = invoker(&mono, InvokeConfig::default());

        assert_eq!(
            invoker.call_value(method, NativePtr::NULL, &[HostValue::from(123)]).unwrap(),
            ManagedValue::I32(-123)
        );

        // Only the boxed result outlives the call
        let before = mono.host.live_allocations();
        let negated = invoker.call::<i64>(method, NativePtr::NULL, &[HostValue::from(-5)]);
        assert_eq!(negated.unwrap(), 5);
        assert_eq!(mono.host.live_allocations(), before + 1);
        assert_eq!(mono.host.call_count("mono_thread_attach"), 1);
    }

    #[test]
    fn test_argument_slot_holds_exact_encoding() {
        let mono = FakeMono::new();
        let int = mono.primitive_type(PrimitiveKind::I32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let method = mono.static_method("Capture", &[int], mono.void_type(), move |call| {
            *captured.lock().unwrap() = call.host().read(call.args[0], 8).unwrap();
            Ok(NativePtr::NULL)
        });
        let invoker = invoker(&mono, InvokeConfig::default());

        assert_eq!(
            invoker.call_value(method, NativePtr::NULL, &[HostValue::Integer(-2)]).unwrap(),
            ManagedValue::Void
        );
        assert_eq!(*seen.lock().unwrap(), [0xFE, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);
    }

    #[test]
    fn test_exact_widths_per_kind() {
        let mono = FakeMono::new();
        let invoker = invoker(&mono, InvokeConfig::default());

        let cases = [
            (PrimitiveKind::I8, HostValue::Integer(-1), ManagedValue::I8(-1)),
            (PrimitiveKind::U8, HostValue::Integer(255), ManagedValue::U8(255)),
            (PrimitiveKind::I16, HostValue::Integer(-300), ManagedValue::I16(-300)),
            (PrimitiveKind::Char, HostValue::Integer(0x263A), ManagedValue::Char(0x263A)),
            (PrimitiveKind::U32, HostValue::Integer(0xFFFF_FFFF), ManagedValue::U32(0xFFFF_FFFF)),
            (PrimitiveKind::I64, HostValue::from(i64::MIN), ManagedValue::I64(i64::MIN)),
            (PrimitiveKind::U64, HostValue::from(u64::MAX), ManagedValue::U64(u64::MAX)),
            (PrimitiveKind::F32, HostValue::Float(0.25), ManagedValue::F32(0.25)),
            (PrimitiveKind::F64, HostValue::Float(-1.5), ManagedValue::F64(-1.5)),
            (PrimitiveKind::Boolean, HostValue::Boolean(true), ManagedValue::Bool(true)),
        ];

        for (kind, input, expected) in cases {
            let ty = mono.primitive_type(kind);
            let method = mono.static_method("Identity", &[ty], ty, move |call| {
                Ok(call.box_raw(kind, call.args[0]))
            });
            assert_eq!(
                invoker.call_value(method, NativePtr::NULL, &[input]).unwrap(),
                expected,
                "{kind}"
            );
        }
    }

    #[test]
    fn test_box_unbox_roundtrip() {
        let mono = FakeMono::new();
        let invoker = invoker(&mono, InvokeConfig::default());

        let boxed = invoker
            .box_primitive(PrimitiveKind::I16, &HostValue::Integer(-12345))
            .unwrap();
        assert_eq!(
            invoker.unbox_value(boxed, PrimitiveKind::I16).unwrap(),
            ManagedValue::I16(-12345)
        );
        assert_eq!(mono.class_of(boxed), Some(mono.primitive_class(PrimitiveKind::I16)));

        let boxed = invoker
            .box_primitive(PrimitiveKind::U64, &HostValue::from(u64::MAX))
            .unwrap();
        assert_eq!(
            invoker.unbox_value(boxed, PrimitiveKind::U64).unwrap(),
            ManagedValue::U64(u64::MAX)
        );

        assert!(matches!(
            invoker.box_primitive(PrimitiveKind::U8, &HostValue::Integer(256)),
            Err(Error::ArgumentMarshal { .. })
        ));
        assert!(invoker.unbox_value(NativePtr::NULL, PrimitiveKind::I32).is_err());
    }

    #[test]
    fn test_box_unbox_every_primitive() {
        use strum::IntoEnumIterator;

        let mono = FakeMono::new();
        let invoker = invoker(&mono, InvokeConfig::default());

        for kind in PrimitiveKind::iter() {
            let (value, expected) = match kind {
                PrimitiveKind::Boolean => (HostValue::from(true), ManagedValue::Bool(true)),
                PrimitiveKind::Char => (HostValue::Integer(0x263A), ManagedValue::Char(0x263A)),
                PrimitiveKind::I8 => (HostValue::from(i8::MIN), ManagedValue::I8(i8::MIN)),
                PrimitiveKind::U8 => (HostValue::from(u8::MAX), ManagedValue::U8(u8::MAX)),
                PrimitiveKind::I16 => (HostValue::from(i16::MIN), ManagedValue::I16(i16::MIN)),
                PrimitiveKind::U16 => (HostValue::from(u16::MAX), ManagedValue::U16(u16::MAX)),
                PrimitiveKind::I32 => (HostValue::from(i32::MIN), ManagedValue::I32(i32::MIN)),
                PrimitiveKind::U32 => (HostValue::from(u32::MAX), ManagedValue::U32(u32::MAX)),
                PrimitiveKind::I64 => (HostValue::from(i64::MIN), ManagedValue::I64(i64::MIN)),
                PrimitiveKind::U64 => (HostValue::from(u64::MAX), ManagedValue::U64(u64::MAX)),
                PrimitiveKind::F32 => (HostValue::from(1.5f32), ManagedValue::F32(1.5)),
                PrimitiveKind::F64 => (HostValue::from(-0.25), ManagedValue::F64(-0.25)),
                PrimitiveKind::ISize => {
                    (HostValue::Integer(-(1 << 40)), ManagedValue::ISize(-(1 << 40)))
                }
                PrimitiveKind::USize => {
                    (HostValue::Integer(1 << 40), ManagedValue::USize(1 << 40))
                }
            };

            let boxed = invoker.box_primitive(kind, &value).unwrap();
            assert_eq!(mono.class_of(boxed), Some(mono.primitive_class(kind)), "{kind}");
            assert_eq!(invoker.unbox_value(boxed, kind).unwrap(), expected, "{kind}");
        }
    }

    #[test]
    fn test_lossy_int64() {
        let mono = FakeMono::new();
        let invoker = invoker(&mono, InvokeConfig::default().with_int64_mode(Int64Mode::Lossy));

        let boxed = invoker
            .box_primitive(PrimitiveKind::I64, &HostValue::Integer(-42))
            .unwrap();
        assert_eq!(
            invoker.unbox_value(boxed, PrimitiveKind::I64).unwrap(),
            ManagedValue::F64(-42.0)
        );
    }

    #[test]
    fn test_primitive_for_reference_rejected_before_call() {
        let mono = FakeMono::new();
        let string = mono.string_type();
        let method = mono.static_method("Echo", &[string], string, |call| Ok(call.args[0]));
        let invoker = invoker(&mono, InvokeConfig::default());

        assert!(matches!(
            invoker.invoke(method, NativePtr::NULL, &[HostValue::Integer(1)]),
            Err(Error::ArgumentMarshal { index: 0, .. })
        ));
        assert_eq!(mono.host.call_count("mono_runtime_invoke"), 0);

        let object = mono.object_type();
        let by_ref = mono.byref_type(PrimitiveKind::I32);
        let method = mono.static_method("Fill", &[object, by_ref], mono.void_type(), negate_body());
        assert!(matches!(
            invoker.invoke(method, NativePtr::NULL, &[HostValue::Null, HostValue::Integer(3)]),
            Err(Error::ArgumentMarshal { index: 1, .. })
        ));
        // Text for an earlier reference parameter is not converted either
        assert!(matches!(
            invoker.invoke(method, NativePtr::NULL, &["text".into(), HostValue::Float(1.0)]),
            Err(Error::ArgumentMarshal { index: 1, .. })
        ));
        assert_eq!(mono.host.call_count("mono_string_new"), 0);
        assert_eq!(mono.host.call_count("mono_runtime_invoke"), 0);
    }

    #[test]
    fn test_text_for_primitive_rejected() {
        let mono = FakeMono::new();
        let int = mono.primitive_type(PrimitiveKind::I32);
        let method = mono.static_method("Negate", &[int], int, negate_body());
        let invoker = invoker(&mono, InvokeConfig::default());

        assert!(matches!(
            invoker.invoke(method, NativePtr::NULL, &["12".into()]),
            Err(Error::ArgumentMarshal { .. })
        ));
        assert!(matches!(
            invoker.invoke(method, NativePtr::NULL, &[HostValue::Integer(1 << 40)]),
            Err(Error::ArgumentMarshal { .. })
        ));
    }

    #[test]
    fn test_string_arguments_and_results() {
        let mono = FakeMono::new();
        let string = mono.string_type();
        let method = mono.static_method("Shout", &[string], string, |call| {
            let text = call.text(0).unwrap_or_default();
            Ok(call.new_string(&text.to_uppercase()))
        });
        let invoker = invoker(&mono, InvokeConfig::default());

        assert_eq!(
            invoker
                .call::<String>(method, NativePtr::NULL, &["héllo wörld".into()])
                .unwrap(),
            "HÉLLO WÖRLD"
        );
        assert_eq!(mono.host.call_count("mono_string_new"), 1);
        assert_eq!(mono.host.call_count("mono_free"), 1);

        // A null string reads as empty text
        let method = mono.static_method("Nothing", &[], string, |_| Ok(NativePtr::NULL));
        assert_eq!(invoker.call::<String>(method, NativePtr::NULL, &[]).unwrap(), "");
    }

    #[test]
    fn test_utf16_string_fallback() {
        let mono = FakeMono::builder().without_export("mono_string_to_utf8").build();
        let method = mono.static_method("Greeting", &[], mono.string_type(), |call| {
            Ok(call.new_string("grüße 🦀"))
        });
        let invoker = invoker(&mono, InvokeConfig::default());

        assert_eq!(
            invoker.call_value(method, NativePtr::NULL, &[]).unwrap(),
            ManagedValue::String("grüße 🦀".to_string())
        );
        assert_eq!(mono.host.call_count("mono_string_chars"), 1);
    }

    #[test]
    fn test_missing_arguments_are_null() {
        let mono = FakeMono::new();
        let object = mono.object_type();
        let boolean = mono.primitive_type(PrimitiveKind::Boolean);
        let method = mono.static_method("BothNull", &[object, object], boolean, |call| {
            let both = call.args.iter().all(|arg| arg.is_null());
            Ok(call.box_value(NativeValue::Bool(both)))
        });

        let lenient = invoker(&mono, InvokeConfig::default());
        assert!(lenient.call::<bool>(method, NativePtr::NULL, &[]).unwrap());
        assert!(matches!(
            lenient.invoke(
                method,
                NativePtr::NULL,
                &[HostValue::Null, HostValue::Null, HostValue::Null]
            ),
            Err(Error::ArgumentMarshal { .. })
        ));

        let strict = invoker(&mono, InvokeConfig::default().with_strict_arity(true));
        assert!(matches!(
            strict.invoke(method, NativePtr::NULL, &[HostValue::Null]),
            Err(Error::ArgumentMarshal { index: 1, .. })
        ));
    }

    #[test]
    fn test_no_parameters_passes_null_array() {
        let mono = FakeMono::new();
        let boolean = mono.primitive_type(PrimitiveKind::Boolean);
        let method = mono.static_method("NoArgs", &[], boolean, |call| {
            Ok(call.box_value(NativeValue::Bool(call.args_array.is_null())))
        });
        let invoker = invoker(&mono, InvokeConfig::default());
        assert!(invoker.call::<bool>(method, NativePtr::NULL, &[]).unwrap());
    }

    #[test]
    fn test_managed_exception() {
        let mono = FakeMono::new();
        let int = mono.primitive_type(PrimitiveKind::I32);
        let method = mono.static_method("Fail", &[], int, |call| {
            Err(call.exception("System", "InvalidOperationException", "boom"))
        });

        let throwing = invoker(&mono, InvokeConfig::default());
        match throwing.invoke(method, NativePtr::NULL, &[]) {
            Err(Error::ManagedInvocation {
                method: name,
                exception,
                type_name,
                message,
            }) => {
                assert_eq!(name, "Fail");
                assert!(!exception.is_null());
                assert_eq!(type_name.as_deref(), Some("System.InvalidOperationException"));
                assert_eq!(message.as_deref(), Some("System.InvalidOperationException: boom"));
            }
            other => panic!("expected a managed exception, got {other:?}"),
        }

        let suppressing = invoker(
            &mono,
            InvokeConfig::default().with_throw_on_managed_exception(false),
        );
        assert_eq!(suppressing.invoke(method, NativePtr::NULL, &[]).unwrap(), NativePtr::NULL);
        assert_eq!(
            suppressing.call_value(method, NativePtr::NULL, &[]).unwrap(),
            ManagedValue::Null
        );
    }

    #[test]
    fn test_exception_with_throwing_to_string() {
        let mono = FakeMono::new();
        let method = mono.static_method("Fail", &[], mono.void_type(), |call| {
            Err(call.faulty_exception("System", "BrokenException"))
        });
        let invoker = invoker(&mono, InvokeConfig::default());

        match invoker.invoke(method, NativePtr::NULL, &[]) {
            Err(Error::ManagedInvocation {
                type_name, message, ..
            }) => {
                assert_eq!(type_name.as_deref(), Some("System.BrokenException"));
                assert_eq!(message, None);
            }
            other => panic!("expected a managed exception, got {other:?}"),
        }
        assert!(mono.escaped_exceptions().is_empty());
        assert_eq!(mono.host.call_count("mono_object_to_string"), 1);
    }

    #[test]
    fn test_exception_slot_cleared_before_each_call() {
        let mono = FakeMono::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let boolean = mono.primitive_type(PrimitiveKind::Boolean);
        let method = mono.static_method("Flaky", &[boolean], mono.void_type(), move |call| {
            let slot = io::read_pointer(call.host(), call.exception_slot).unwrap();
            captured.lock().unwrap().push(slot.is_null());
            if call.arg::<u8>(0) == 0 {
                Ok(NativePtr::NULL)
            } else {
                Err(call.exception("System", "Exception", "flaky"))
            }
        });
        let invoker = invoker(&mono, InvokeConfig::default());

        assert!(invoker.invoke(method, NativePtr::NULL, &[true.into()]).is_err());
        assert!(invoker.invoke(method, NativePtr::NULL, &[false.into()]).is_ok());
        assert_eq!(*seen.lock().unwrap(), [true, true]);
    }

    #[test]
    fn test_reentrant_invocation_rejected() {
        let mono = FakeMono::new();
        let int = mono.primitive_type(PrimitiveKind::I32);
        let inner = mono.static_method("Inner", &[], int, |call| {
            Ok(call.box_value(NativeValue::I32(1)))
        });

        let shared: Arc<OnceLock<Arc<Invoker>>> = Arc::new(OnceLock::new());
        let nested = Arc::clone(&shared);
        let outcome = Arc::new(Mutex::new(None));
        let recorded = Arc::clone(&outcome);
        let outer = mono.static_method("Outer", &[], mono.void_type(), move |_call| {
            let result = nested.get().unwrap().invoke(inner, NativePtr::NULL, &[]);
            *recorded.lock().unwrap() = Some(matches!(result, Err(Error::ReentrantInvocation(_))));
            Ok(NativePtr::NULL)
        });

        let invoker = Arc::new(invoker(&mono, InvokeConfig::default()));
        invoker.signature(inner).unwrap();
        assert!(shared.set(Arc::clone(&invoker)).is_ok());

        invoker.invoke(outer, NativePtr::NULL, &[]).unwrap();
        assert_eq!(*outcome.lock().unwrap(), Some(true));
        // The slot is released once the outer call returns
        assert_eq!(invoker.call::<i32>(inner, NativePtr::NULL, &[]).unwrap(), 1);
    }

    #[test]
    fn test_signature_is_cached() {
        let mono = FakeMono::new();
        let int = mono.primitive_type(PrimitiveKind::I32);
        let method = mono.static_method("Negate", &[int], int, negate_body());
        let invoker = invoker(&mono, InvokeConfig::default());

        let first = invoker.signature(method).unwrap();
        let second = invoker.signature(method).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(mono.host.call_count("mono_method_signature"), 1);
        assert_eq!(first.arity(), 1);
        assert_eq!(first.params[0].kind, ManagedKind::Primitive(PrimitiveKind::I32));
        assert_eq!(first.params[0].element, Some(ElementType::I4));
        assert!(!first.params[0].byref);
    }

    #[test]
    fn test_enum_and_struct_results() {
        let mono = FakeMono::new();
        let color = mono.enum_type("Game", "Color", PrimitiveKind::U8);
        let vector = mono.struct_type("UnityEngine", "Vector3");
        let invoker = invoker(&mono, InvokeConfig::default());

        let next = mono.static_method("Next", &[color], color, |call| {
            Ok(call.box_value(NativeValue::U8(call.arg::<u8>(0) + 1)))
        });
        assert_eq!(
            invoker.call_value(next, NativePtr::NULL, &[HostValue::Integer(2)]).unwrap(),
            ManagedValue::U8(3)
        );
        assert_eq!(
            invoker.signature(next).unwrap().ret.kind,
            ManagedKind::Enum(PrimitiveKind::U8)
        );

        let origin = mono.static_method("Origin", &[], vector, |call| Ok(call.box_bytes(&[0; 12])));
        let value = invoker.call_value(origin, NativePtr::NULL, &[]).unwrap();
        assert!(matches!(value, ManagedValue::Boxed(handle) if !handle.is_null()));

        // Structs take boxed handles, not primitives
        let consume =
            mono.static_method("Consume", &[vector], mono.void_type(), |_| Ok(NativePtr::NULL));
        assert!(matches!(
            invoker.invoke(consume, NativePtr::NULL, &[HostValue::Integer(0)]),
            Err(Error::ArgumentMarshal { .. })
        ));
        invoker
            .invoke(consume, NativePtr::NULL, &[HostValue::Handle(value.as_handle().unwrap())])
            .unwrap();
    }

    #[test]
    fn test_object_results_and_instance() {
        let mono = FakeMono::new();
        let method = mono.static_method("Self", &[], mono.object_type(), |call| Ok(call.instance));
        let invoker = invoker(&mono, InvokeConfig::default());

        let target = mono.new_object("Game", "Player");
        assert_eq!(
            invoker.call_value(method, target, &[]).unwrap(),
            ManagedValue::Object(target)
        );
        assert_eq!(
            invoker.call_value(method, NativePtr::NULL, &[]).unwrap(),
            ManagedValue::Null
        );
    }

    #[test]
    fn test_class_names() {
        let mono = FakeMono::new();
        let binder = mono.binder();

        let class = mono.class_of(mono.new_object("System.Text", "StringBuilder")).unwrap();
        assert_eq!(
            class_name(&binder, class).unwrap(),
            ("System.Text".to_string(), "StringBuilder".to_string())
        );
        assert_eq!(class_full_name(&binder, class).unwrap(), "System.Text.StringBuilder");

        let global = mono.class_of(mono.new_object("", "Marker")).unwrap();
        assert_eq!(class_full_name(&binder, global).unwrap(), "Marker");
    }

    #[test]
    fn test_generic_instantiation_not_supported() {
        let mono = FakeMono::new();
        let invoker = invoker(&mono, InvokeConfig::default());
        assert!(matches!(
            invoker.inflate_generic_method(NativePtr::new(0x10), &[]),
            Err(Error::NotSupported(_))
        ));
    }
}
