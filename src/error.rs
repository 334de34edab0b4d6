use thiserror::Error;

use crate::host::NativePtr;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! marshal_error {
    ($target:expr, $index:expr, $msg:expr) => {
        crate::Error::ArgumentMarshal {
            target: $target.to_string(),
            index: $index,
            reason: $msg.to_string(),
        }
    };

    ($target:expr, $index:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::ArgumentMarshal {
            target: $target.to_string(),
            index: $index,
            reason: format!($fmt, $($arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into two groups that callers usually want to treat differently:
///
/// ## Programmer errors
/// - [`Error::SymbolResolution`] - A required export could not be found under any name
/// - [`Error::SignatureNotFound`] - An export was bound without a declared signature
/// - [`Error::ArgumentMarshal`] - A host value does not fit the declared parameter
/// - [`Error::ReentrantInvocation`] - The exception slot is already in use
/// - [`Error::ForeignThread`] - A thread other than the caller was asked to attach
/// - [`Error::ValueConversion`] - A managed result was requested as the wrong host type
///
/// ## Domain errors
/// - [`Error::ManagedInvocation`] - The instrumented application threw a managed exception
///
/// Everything else reports faults of the host environment or its memory.
///
/// # Examples
///
/// ```rust,no_run
/// use monoscope::{Error, MonoApi, MonoApiConfig, NativePtr, host::simulated::SimulatedHost};
/// use std::sync::Arc;
///
/// let host = Arc::new(SimulatedHost::new("mono-2.0-bdwgc.dll"));
/// let api = MonoApi::new(host, MonoApiConfig::default());
/// match api.runtime_invoke(NativePtr::new(0x1000), NativePtr::NULL, &[]) {
///     Ok(result) => println!("returned {result}"),
///     Err(Error::ManagedInvocation { type_name, message, .. }) => {
///         eprintln!("target threw {type_name:?}: {message:?}");
///     }
///     Err(e) => eprintln!("malformed call: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A required export could not be resolved.
    ///
    /// Raised after the primary name, every alias, the normalized export scan and
    /// the fuzzy fallback have all failed. Calling through an unresolved address
    /// is undefined behaviour, so this is never recovered internally.
    #[error("Unable to resolve export '{symbol}' in module '{module}'")]
    SymbolResolution {
        /// The logical export name that was requested
        symbol: String,
        /// The module that was searched
        module: String,
    },

    /// No signature is declared for the export that should be bound.
    #[error("No signature declared for export '{0}'")]
    SignatureNotFound(String),

    /// The managed runtime raised an exception during the call.
    ///
    /// The exception handle is always non-null. Type name and message are filled
    /// in when they could be resolved through the runtime.
    #[error(
        "Managed exception in '{method}': {}: {}",
        .type_name.as_deref().unwrap_or("<unknown type>"),
        .message.as_deref().unwrap_or("<no message>")
    )]
    ManagedInvocation {
        /// The method (or export) that was being invoked
        method: String,
        /// The raw `MonoObject*` of the exception
        exception: NativePtr,
        /// Namespace-qualified type name of the exception, if resolvable
        type_name: Option<String>,
        /// The exception's string representation, if resolvable
        message: Option<String>,
    },

    /// A host value could not be marshalled into the declared parameter.
    #[error("Argument {index} of '{target}' could not be marshalled: {reason}")]
    ArgumentMarshal {
        /// The method or export being called
        target: String,
        /// Zero-based argument index
        index: usize,
        /// What went wrong
        reason: String,
    },

    /// A second invocation was started while the exception slot was still in use.
    #[error("Re-entrant invocation of '{0}' while another call is in flight")]
    ReentrantInvocation(String),

    /// Attaching was requested for a thread id that is not the calling thread.
    ///
    /// `mono_thread_attach` always registers the calling native thread, so an
    /// attachment can only be created by the thread it belongs to.
    #[error("Thread {requested} cannot be attached from thread {current}")]
    ForeignThread {
        /// The thread id the caller asked to attach
        requested: u64,
        /// The id of the calling thread
        current: u64,
    },

    /// A managed value could not be converted into the requested host type.
    #[error("Cannot convert managed value of type {found} into {expected}")]
    ValueConversion {
        /// The requested host type
        expected: &'static str,
        /// The type of the managed value
        found: &'static str,
    },

    /// A runtime entry point that must produce a handle returned null.
    #[error("'{0}' returned a null handle")]
    NullResult(String),

    /// Access to an invalid or freed native address.
    #[error("Invalid pointer 0x{address:016X}: {reason}")]
    InvalidPointer {
        /// The offending address
        address: u64,
        /// Why the access was rejected
        reason: &'static str,
    },

    /// An out of bound access was attempted.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Allocating scratch memory would exceed the configured limit.
    #[error("Memory limit exceeded: {current} bytes in use (limit: {limit})")]
    MemoryLimitExceeded {
        /// Bytes currently allocated
        current: usize,
        /// Maximum allowed
        limit: usize,
    },

    /// The requested operation is intentionally not implemented.
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    /// Input (such as a C header) is damaged and could not be parsed.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Failure reported by the host instrumentation environment.
    #[error("{0}")]
    Host(String),

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Returns `true` if this error originates from the instrumented application
    /// rather than from a malformed call.
    #[must_use]
    pub fn is_managed_exception(&self) -> bool {
        matches!(self, Error::ManagedInvocation { .. })
    }
}
