//! The public facade over resolution, binding, attachment and invocation.
//!
//! [`MonoApi`] wires the components together in dependency order
//! (resolver, binder, thread guard, invoker, attribute decoder) and is what most
//! callers hold on to for the lifetime of an instrumentation session.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use monoscope::{host::simulated::SimulatedHost, HostValue, MonoApi, MonoApiConfig, NativePtr};
//!
//! let host = Arc::new(SimulatedHost::new("mono-2.0-bdwgc.dll"));
//! let api = MonoApi::new(host, MonoApiConfig::default());
//!
//! let method = api.method(NativePtr::new(0x7FFF_0000_1000));
//! let sum: i32 = method.call(NativePtr::NULL, &[HostValue::from(2), HostValue::from(3)])?;
//! println!("{} returned {sum}", method.name()?);
//!
//! api.shutdown();
//! # Ok::<(), monoscope::Error>(())
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::{
    attributes::{CustomAttributeDecoder, CustomAttributeRecord},
    binder::{BoundFunction, NativeBinder},
    config::MonoApiConfig,
    host::{HostEnvironment, NativePtr, NativeValue},
    invoke::{FromManagedValue, HostValue, Invoker, ManagedValue, MethodSignature, PrimitiveKind},
    resolver::SymbolResolver,
    signatures::SignatureTable,
    thread::ThreadAttachment,
    Result,
};

/// Entry point into a running Mono runtime.
pub struct MonoApi {
    config: MonoApiConfig,
    resolver: Arc<SymbolResolver>,
    binder: Arc<NativeBinder>,
    threads: Arc<ThreadAttachment>,
    invoker: Invoker,
    attributes: CustomAttributeDecoder,
}

impl MonoApi {
    /// Creates a session using the built-in signature catalog.
    ///
    /// Nothing is resolved or called until first use.
    ///
    /// # Arguments
    ///
    /// * `host` - The instrumentation environment of the target process
    /// * `config` - Module name and component settings
    #[must_use]
    pub fn new(host: Arc<dyn HostEnvironment>, config: MonoApiConfig) -> Self {
        Self::with_signatures(host, Arc::new(SignatureTable::default_catalog()), config)
    }

    /// Creates a session resolving against a custom signature table.
    #[must_use]
    pub fn with_signatures(
        host: Arc<dyn HostEnvironment>,
        signatures: Arc<SignatureTable>,
        config: MonoApiConfig,
    ) -> Self {
        let resolver = Arc::new(SymbolResolver::new(host, signatures, config.resolver.clone()));
        let binder = Arc::new(NativeBinder::new(Arc::clone(&resolver)));
        let threads = Arc::new(ThreadAttachment::new(Arc::clone(&binder)));
        let invoker = Invoker::new(
            Arc::clone(&binder),
            Arc::clone(&threads),
            config.invoke.clone(),
        );
        let attributes =
            CustomAttributeDecoder::new(Arc::clone(&binder), config.attributes.clone());

        debug!(
            target: "monoscope::api",
            module = %config.resolver.module,
            signatures = resolver.signatures().len(),
            "created Mono API session"
        );

        MonoApi {
            config,
            resolver,
            binder,
            threads,
            invoker,
            attributes,
        }
    }

    /// Returns `true` if the runtime exports `name` under any known spelling.
    #[must_use]
    pub fn has_export(&self, name: &str) -> bool {
        self.binder.has_export(name)
    }

    /// Resolves the address of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SymbolResolution`] if the export cannot be found.
    pub fn resolve(&self, name: &str) -> Result<NativePtr> {
        self.resolver.resolve(name)
    }

    /// Returns the bound callable for `name`.
    ///
    /// # Errors
    ///
    /// See [`NativeBinder::callable`].
    pub fn callable(&self, name: &str) -> Result<Arc<BoundFunction>> {
        self.binder.callable(name)
    }

    /// Calls the export `name` directly.
    ///
    /// The calling thread is not attached automatically; use
    /// [`attach_thread`](Self::attach_thread) first for exports that need it.
    ///
    /// # Errors
    ///
    /// See [`NativeBinder::call`].
    pub fn call(&self, name: &str, args: &[NativeValue]) -> Result<NativeValue> {
        self.binder.call(name, args)
    }

    /// Attaches a thread to the runtime (the calling thread for `None`).
    ///
    /// # Errors
    ///
    /// See [`ThreadAttachment::ensure_attached`].
    pub fn attach_thread(&self, thread_id: Option<u64>) -> Result<NativePtr> {
        self.threads.ensure_attached(thread_id)
    }

    /// Detaches a thread, returning whether it was attached.
    ///
    /// # Errors
    ///
    /// Returns an error if `mono_thread_detach` fails.
    pub fn detach_thread(&self, thread_id: Option<u64>) -> Result<bool> {
        self.threads.detach(thread_id)
    }

    /// Detaches every attached thread, returning how many succeeded.
    pub fn detach_all_threads(&self) -> usize {
        self.threads.detach_all()
    }

    /// The runtime's root domain.
    ///
    /// # Errors
    ///
    /// See [`ThreadAttachment::root_domain`].
    pub fn root_domain(&self) -> Result<NativePtr> {
        self.threads.root_domain()
    }

    /// Invokes a managed method and returns the raw result object.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`].
    pub fn runtime_invoke(
        &self,
        method: NativePtr,
        instance: NativePtr,
        args: &[HostValue],
    ) -> Result<NativePtr> {
        self.invoker.invoke(method, instance, args)
    }

    /// Wraps a `MonoMethod*` for invocation.
    #[must_use]
    pub fn method(&self, handle: NativePtr) -> MonoMethod<'_> {
        MonoMethod { api: self, handle }
    }

    /// Decodes a `MonoCustomAttrInfo`, releasing it unless it is cached.
    #[must_use]
    pub fn decode_custom_attributes(&self, info: NativePtr) -> Vec<CustomAttributeRecord> {
        self.attributes.decode(info)
    }

    /// Ends the session: detaches every thread this session attached.
    ///
    /// Detach failures are logged and skipped. Resolved addresses and bound
    /// callables stay valid, so the session may still be used afterwards.
    ///
    /// # Returns
    ///
    /// The number of threads detached.
    pub fn shutdown(&self) -> usize {
        let detached = self.threads.detach_all();
        debug!(target: "monoscope::api", detached, "shut down Mono API session");
        detached
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &MonoApiConfig {
        &self.config
    }

    /// The symbol resolver.
    #[must_use]
    pub fn resolver(&self) -> &Arc<SymbolResolver> {
        &self.resolver
    }

    /// The native call binder.
    #[must_use]
    pub fn binder(&self) -> &Arc<NativeBinder> {
        &self.binder
    }

    /// The thread attachment guard.
    #[must_use]
    pub fn threads(&self) -> &Arc<ThreadAttachment> {
        &self.threads
    }

    /// The invocation engine.
    #[must_use]
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// The custom attribute decoder.
    #[must_use]
    pub fn attributes(&self) -> &CustomAttributeDecoder {
        &self.attributes
    }
}

/// A managed method bound to its session.
#[derive(Clone, Copy)]
pub struct MonoMethod<'a> {
    api: &'a MonoApi,
    handle: NativePtr,
}

impl MonoMethod<'_> {
    /// The raw `MonoMethod*`.
    #[must_use]
    pub fn handle(&self) -> NativePtr {
        self.handle
    }

    /// Invokes the method and returns the raw result object.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`].
    pub fn invoke(&self, instance: NativePtr, args: &[HostValue]) -> Result<NativePtr> {
        self.api.invoker.invoke(self.handle, instance, args)
    }

    /// Invokes the method and unboxes the result.
    ///
    /// # Errors
    ///
    /// See [`Invoker::call_value`].
    pub fn call_value(&self, instance: NativePtr, args: &[HostValue]) -> Result<ManagedValue> {
        self.api.invoker.call_value(self.handle, instance, args)
    }

    /// Invokes the method and converts the result into `T`.
    ///
    /// # Errors
    ///
    /// See [`Invoker::call`].
    pub fn call<T: FromManagedValue>(&self, instance: NativePtr, args: &[HostValue]) -> Result<T> {
        self.api.invoker.call(self.handle, instance, args)
    }

    /// Boxes a primitive, e.g. to pass it where the method takes `object`.
    ///
    /// # Errors
    ///
    /// See [`Invoker::box_primitive`].
    pub fn box_primitive(&self, kind: PrimitiveKind, value: &HostValue) -> Result<NativePtr> {
        self.api.invoker.box_primitive(kind, value)
    }

    /// Parameter and return types.
    ///
    /// # Errors
    ///
    /// See [`Invoker::signature`].
    pub fn signature(&self) -> Result<Arc<MethodSignature>> {
        self.api.invoker.signature(self.handle)
    }

    /// The method name.
    ///
    /// # Errors
    ///
    /// See [`Invoker::method_name`].
    pub fn name(&self) -> Result<String> {
        self.api.invoker.method_name(self.handle)
    }

    /// Custom attributes applied to the method.
    ///
    /// # Errors
    ///
    /// Returns an error if `mono_custom_attrs_from_method` cannot be called.
    pub fn custom_attributes(&self) -> Result<Vec<CustomAttributeRecord>> {
        self.api.attributes.decode_for_method(self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::InvokeConfig,
        test::FakeMono,
        Error,
    };

    fn api(mono: &FakeMono, config: MonoApiConfig) -> MonoApi {
        MonoApi::new(Arc::new(mono.host.clone()), config)
    }

    #[test]
    fn test_method_facade() {
        let mono = FakeMono::new();
        let int = mono.primitive_type(PrimitiveKind::I32);
        let handle = mono.static_method("Add", &[int, int], int, |call| {
            Ok(call.box_value(NativeValue::I32(call.arg::<i32>(0) + call.arg::<i32>(1))))
        });
        let obsolete = mono.attribute_constructor("System", "ObsoleteAttribute");
        mono.set_method_attributes(handle, &[obsolete]);

        let api = api(&mono, MonoApiConfig::default());
        let method = api.method(handle);

        assert_eq!(method.handle(), handle);
        assert_eq!(method.name().unwrap(), "Add");
        assert_eq!(method.signature().unwrap().arity(), 2);
        assert_eq!(method.call::<i32>(NativePtr::NULL, &[40.into(), 2.into()]).unwrap(), 42);
        assert_eq!(
            method.call_value(NativePtr::NULL, &[(-1).into(), (-2).into()]).unwrap(),
            ManagedValue::I32(-3)
        );
        assert!(!method.invoke(NativePtr::NULL, &[1.into(), 1.into()]).unwrap().is_null());

        let attributes = method.custom_attributes().unwrap();
        assert_eq!(attributes.len(), 1);
        assert!(attributes[0].is("Obsolete"));

        let boxed = method.box_primitive(PrimitiveKind::F64, &0.5.into()).unwrap();
        assert_eq!(
            api.invoker().unbox_value(boxed, PrimitiveKind::F64).unwrap(),
            ManagedValue::F64(0.5)
        );
    }

    #[test]
    fn test_session_threads() {
        let mono = FakeMono::new();
        let api = api(&mono, MonoApiConfig::default());

        assert_eq!(api.root_domain().unwrap(), mono.domain);
        mono.host.set_current_thread_id(10);
        api.attach_thread(None).unwrap();
        mono.host.set_current_thread_id(11);
        api.attach_thread(Some(11)).unwrap();
        assert!(matches!(
            api.attach_thread(Some(12)),
            Err(Error::ForeignThread { .. })
        ));
        assert!(api.detach_thread(Some(10)).unwrap());
        assert!(!api.detach_thread(Some(10)).unwrap());
        assert_eq!(api.shutdown(), 1);
        assert_eq!(api.threads().attached_count(), 0);
        assert_eq!(api.detach_all_threads(), 0);
    }

    #[test]
    fn test_exports() {
        let mono = FakeMono::new();
        let api = api(&mono, MonoApiConfig::default());

        assert!(api.has_export("mono_runtime_invoke"));
        assert!(!api.has_export(""));
        assert!(!api.has_export("mono_definitely_missing"));
        assert_eq!(
            api.call("mono_get_root_domain", &[]).unwrap(),
            NativeValue::Pointer(mono.domain)
        );
        assert!(Arc::ptr_eq(
            &api.callable("mono_get_root_domain").unwrap(),
            &api.callable("mono_get_root_domain").unwrap()
        ));
        assert_eq!(
            api.resolve("mono_get_root_domain").unwrap(),
            api.callable("mono_get_root_domain").unwrap().address()
        );
    }

    #[test]
    fn test_runtime_invoke_exception_sentinel() {
        let mono = FakeMono::new();
        let method = mono.static_method("Throw", &[], mono.void_type(), |call| {
            Err(call.exception("System", "Exception", "nope"))
        });

        let throwing = api(&mono, MonoApiConfig::default());
        let error = throwing.runtime_invoke(method, NativePtr::NULL, &[]).unwrap_err();
        assert!(error.is_managed_exception());

        let mut config = MonoApiConfig::default();
        config.invoke = InvokeConfig::default().with_throw_on_managed_exception(false);
        let quiet = api(&mono, config);
        assert_eq!(quiet.runtime_invoke(method, NativePtr::NULL, &[]).unwrap(), NativePtr::NULL);
        assert!(matches!(
            quiet.runtime_invoke(method, NativePtr::NULL, &[HostValue::Null]),
            Err(Error::ArgumentMarshal { .. })
        ));
    }

    #[test]
    fn test_decode_custom_attributes() {
        let mono = FakeMono::new();
        let flags = mono.attribute_constructor("System", "FlagsAttribute");
        let info = mono.custom_attr_info(&[flags], false);

        let api = api(&mono, MonoApiConfig::default());
        let records = api.decode_custom_attributes(info);
        assert_eq!(records[0].to_string(), "[System.FlagsAttribute]");
        assert_eq!(mono.freed_attr_infos(), vec![info]);
    }
}
