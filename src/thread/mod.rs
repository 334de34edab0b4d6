//! Per-native-thread attachment to the managed runtime.
//!
//! Any native thread that calls into Mono must first be registered with the
//! runtime through `mono_thread_attach`, otherwise the garbage collector does
//! not know about its stack and the call may crash. [`ThreadAttachment`] keeps
//! one record per native thread id and attaches lazily on first use.
//!
//! # State Machine
//!
//! ```text
//! unattached --ensure_attached--> attached --detach--> unattached
//! ```
//!
//! Repeated `ensure_attached` calls for an attached thread are no-ops; detaching
//! an unattached thread is a no-op as well. A record is only ever created by the
//! thread it describes.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::{
    binder::NativeBinder,
    host::{NativePtr, NativeValue},
    Error, Result,
};

/// Tracks which native threads are attached to the runtime.
pub struct ThreadAttachment {
    binder: Arc<NativeBinder>,
    root_domain: OnceLock<NativePtr>,
    records: DashMap<u64, NativePtr>,
}

impl ThreadAttachment {
    /// Creates a guard without any attached threads.
    #[must_use]
    pub fn new(binder: Arc<NativeBinder>) -> Self {
        ThreadAttachment {
            binder,
            root_domain: OnceLock::new(),
            records: DashMap::new(),
        }
    }

    /// Returns the runtime's root domain, querying it once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NullResult`] if the runtime reports no root domain (it is
    /// not initialized yet), or any error of calling `mono_get_root_domain`.
    pub fn root_domain(&self) -> Result<NativePtr> {
        if let Some(domain) = self.root_domain.get() {
            return Ok(*domain);
        }

        let domain = self.binder.call_pointer("mono_get_root_domain", &[])?;
        if domain.is_null() {
            return Err(Error::NullResult("mono_get_root_domain".to_string()));
        }
        Ok(*self.root_domain.get_or_init(|| domain))
    }

    /// Attaches the thread to the runtime unless it already is.
    ///
    /// Only the calling thread can be attached. An explicit id that differs from
    /// the host's current thread id is answered from its existing record, if any.
    ///
    /// # Arguments
    ///
    /// * `thread_id` - Native thread id, or `None` for the calling thread
    ///
    /// # Returns
    ///
    /// The managed thread handle of the attachment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignThread`] if `thread_id` names another, unattached
    /// thread. Returns an error if the root domain is unavailable or
    /// `mono_thread_attach` fails or returns null.
    pub fn ensure_attached(&self, thread_id: Option<u64>) -> Result<NativePtr> {
        let current = self.binder.resolver().host().current_thread_id();
        let thread_id = thread_id.unwrap_or(current);
        if let Some(handle) = self.records.get(&thread_id) {
            return Ok(*handle);
        }
        if thread_id != current {
            return Err(Error::ForeignThread {
                requested: thread_id,
                current,
            });
        }

        let domain = self.root_domain()?;
        let handle = self
            .binder
            .call_pointer("mono_thread_attach", &[NativeValue::Pointer(domain)])?;
        if handle.is_null() {
            return Err(Error::NullResult("mono_thread_attach".to_string()));
        }

        debug!(target: "monoscope::thread", thread_id, %handle, "attached thread");
        Ok(*self.records.entry(thread_id).or_insert(handle))
    }

    /// Runs `f` on the calling thread after making sure it is attached.
    ///
    /// # Errors
    ///
    /// Returns the attachment error, or whatever `f` returns.
    pub fn with_attached_thread<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(NativePtr) -> Result<T>,
    {
        let handle = self.ensure_attached(None)?;
        f(handle)
    }

    /// Detaches the thread and drops its record.
    ///
    /// # Returns
    ///
    /// `true` if the thread was attached, `false` if there was nothing to do.
    ///
    /// # Errors
    ///
    /// Returns an error if `mono_thread_detach` fails. The record is removed
    /// regardless, since the runtime's view of the thread is unknown afterwards.
    pub fn detach(&self, thread_id: Option<u64>) -> Result<bool> {
        let thread_id = self.thread_id(thread_id);
        let Some((_, handle)) = self.records.remove(&thread_id) else {
            return Ok(false);
        };

        self.binder
            .call("mono_thread_detach", &[NativeValue::Pointer(handle)])?;
        debug!(target: "monoscope::thread", thread_id, %handle, "detached thread");
        Ok(true)
    }

    /// Detaches every recorded thread, logging and skipping failures.
    ///
    /// # Returns
    ///
    /// The number of threads detached successfully.
    pub fn detach_all(&self) -> usize {
        let thread_ids: Vec<u64> = self.records.iter().map(|record| *record.key()).collect();

        thread_ids
            .into_iter()
            .filter(|thread_id| match self.detach(Some(*thread_id)) {
                Ok(detached) => detached,
                Err(error) => {
                    warn!(
                        target: "monoscope::thread",
                        thread_id,
                        %error,
                        "failed to detach thread during teardown"
                    );
                    false
                }
            })
            .count()
    }

    /// Returns `true` if the thread has an attachment record.
    #[must_use]
    pub fn is_attached(&self, thread_id: Option<u64>) -> bool {
        self.records.contains_key(&self.thread_id(thread_id))
    }

    /// Number of attached threads.
    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.records.len()
    }

    fn thread_id(&self, thread_id: Option<u64>) -> u64 {
        thread_id.unwrap_or_else(|| self.binder.resolver().host().current_thread_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::FakeMono;

    #[test]
    fn test_attach_once_per_thread() {
        let mono = FakeMono::new();
        let threads = ThreadAttachment::new(mono.binder());

        let first = threads.ensure_attached(None).unwrap();
        let second = threads.ensure_attached(None).unwrap();
        assert_eq!(first, second);
        assert_eq!(mono.host.call_count("mono_thread_attach"), 1);
        assert_eq!(mono.host.call_count("mono_get_root_domain"), 1);
        assert!(threads.is_attached(None));

        mono.host.set_current_thread_id(7);
        assert!(!threads.is_attached(None));
        threads.ensure_attached(None).unwrap();
        assert_eq!(threads.attached_count(), 2);
        assert_eq!(mono.host.call_count("mono_thread_attach"), 2);
        assert_eq!(mono.host.call_count("mono_get_root_domain"), 1);
    }

    #[test]
    fn test_attach_passes_root_domain() {
        let mono = FakeMono::new();
        let threads = ThreadAttachment::new(mono.binder());

        threads.ensure_attached(Some(1)).unwrap();
        assert_eq!(mono.attached_domains(), vec![mono.domain]);
        assert_eq!(threads.root_domain().unwrap(), mono.domain);
    }

    #[test]
    fn test_foreign_thread_is_not_attached() {
        let mono = FakeMono::new();
        let threads = ThreadAttachment::new(mono.binder());

        mono.host.set_current_thread_id(1);
        let result = threads.ensure_attached(Some(7));
        assert!(matches!(
            result,
            Err(Error::ForeignThread {
                requested: 7,
                current: 1
            })
        ));
        assert!(!threads.is_attached(Some(7)));
        assert!(!threads.is_attached(None));
        assert_eq!(mono.host.call_count("mono_thread_attach"), 0);

        // Once thread 7 attaches itself, other threads may look its record up
        mono.host.set_current_thread_id(7);
        let handle = threads.ensure_attached(None).unwrap();
        mono.host.set_current_thread_id(1);
        assert_eq!(threads.ensure_attached(Some(7)).unwrap(), handle);
        assert_eq!(mono.host.call_count("mono_thread_attach"), 1);
        assert!(!threads.is_attached(None));
    }

    #[test]
    fn test_detach() {
        let mono = FakeMono::new();
        let threads = ThreadAttachment::new(mono.binder());

        assert!(!threads.detach(Some(5)).unwrap());
        assert_eq!(mono.host.call_count("mono_thread_detach"), 0);

        mono.host.set_current_thread_id(5);
        threads.ensure_attached(Some(5)).unwrap();
        assert!(threads.detach(Some(5)).unwrap());
        assert!(!threads.is_attached(Some(5)));
        assert_eq!(mono.host.call_count("mono_thread_detach"), 1);

        // Re-attaching after detach attaches again
        threads.ensure_attached(Some(5)).unwrap();
        assert_eq!(mono.host.call_count("mono_thread_attach"), 2);
    }

    #[test]
    fn test_detach_all() {
        let mono = FakeMono::new();
        let threads = ThreadAttachment::new(mono.binder());

        for thread_id in 1..=3 {
            mono.host.set_current_thread_id(thread_id);
            threads.ensure_attached(Some(thread_id)).unwrap();
        }
        assert_eq!(threads.detach_all(), 3);
        assert_eq!(threads.attached_count(), 0);
        assert_eq!(threads.detach_all(), 0);
    }

    #[test]
    fn test_detach_all_swallows_failures() {
        let mono = FakeMono::builder().without_export("mono_thread_detach").build();
        let threads = ThreadAttachment::new(mono.binder());

        threads.ensure_attached(Some(1)).unwrap();
        mono.host.set_current_thread_id(2);
        threads.ensure_attached(None).unwrap();
        assert_eq!(threads.detach_all(), 0);
        assert_eq!(threads.attached_count(), 0);
    }

    #[test]
    fn test_null_root_domain() {
        let mono = FakeMono::builder().with_root_domain(NativePtr::NULL).build();
        let threads = ThreadAttachment::new(mono.binder());

        assert!(matches!(threads.root_domain(), Err(Error::NullResult(_))));
        assert!(threads.ensure_attached(None).is_err());
        assert_eq!(threads.attached_count(), 0);
    }

    #[test]
    fn test_with_attached_thread() {
        let mono = FakeMono::new();
        let threads = ThreadAttachment::new(mono.binder());

        let value = threads
            .with_attached_thread(|handle| {
                assert!(!handle.is_null());
                Ok(42)
            })
            .unwrap();
        assert_eq!(value, 42);
        assert!(threads.is_attached(None));
    }
}
