//! Abstract capability set of the host instrumentation environment.
//!
//! Everything this crate does to the target process goes through
//! [`HostEnvironment`]: scratch allocation, raw memory access, export lookup,
//! export enumeration, binding an address into a callable, and querying the
//! calling thread. The crate never touches process memory directly, which keeps
//! the resolver, binder and invocation engine independent of how the host
//! actually reaches into the target (an injected agent, a debugger bridge, or the
//! in-process [`simulated::SimulatedHost`]).
//!
//! # Key Components
//!
//! - [`NativePtr`] - Address in the target process
//! - [`NativeType`] / [`NativeValue`] - ABI type tags and the values passed through them
//! - [`HostEnvironment`] - The capability provider trait
//! - [`NativeFunction`] - A synchronously callable, ABI-bound native function
//! - [`io`] - Width-exact reads and writes on top of the raw byte interface

use std::{fmt, sync::Arc};

use crate::Result;

pub mod io;
pub mod simulated;
mod types;

pub use types::{NativeType, NativeValue};

/// An address in the instrumented process.
///
/// Addresses are always carried as 64-bit values, independent of the target's
/// pointer width; [`HostEnvironment::pointer_size`] decides how many bytes are
/// read or written when a pointer is stored in native memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativePtr(u64);

impl NativePtr {
    /// The null pointer.
    pub const NULL: NativePtr = NativePtr(0);

    /// Creates a pointer from a raw address.
    #[must_use]
    pub const fn new(address: u64) -> Self {
        NativePtr(address)
    }

    /// Returns the raw address.
    #[must_use]
    pub const fn address(self) -> u64 {
        self.0
    }

    /// Returns `true` for the null pointer.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns a pointer `offset` bytes past this one.
    #[must_use]
    pub const fn add(self, offset: usize) -> Self {
        NativePtr(self.0.wrapping_add(offset as u64))
    }

    /// Converts a null pointer into `None`.
    #[must_use]
    pub fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl From<u64> for NativePtr {
    fn from(address: u64) -> Self {
        NativePtr(address)
    }
}

/// One named export of a module, as reported by export enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportEntry {
    /// Exported symbol name
    pub name: String,
    /// Absolute address of the symbol
    pub address: NativePtr,
}

impl ExportEntry {
    /// Creates a new export entry.
    #[must_use]
    pub fn new(name: impl Into<String>, address: NativePtr) -> Self {
        ExportEntry {
            name: name.into(),
            address,
        }
    }
}

/// A native function bound to a concrete ABI signature.
///
/// Calls are synchronous and blocking: the host performs the full round trip into
/// the target before returning. Argument values are guaranteed by the caller to
/// match the declared parameter types.
pub trait NativeFunction: Send + Sync {
    /// Calls the native function.
    ///
    /// # Arguments
    ///
    /// * `args` - One value per declared parameter, in order
    ///
    /// # Errors
    ///
    /// Returns whatever failure the host reports for the native call.
    fn call(&self, args: &[NativeValue]) -> Result<NativeValue>;
}

/// Capability provider for everything this crate needs from the outside world.
///
/// Implementations must be thread-safe; the crate itself only issues one call at a
/// time per [`crate::MonoApi`] but shares the host between components.
pub trait HostEnvironment: Send + Sync {
    /// Width of a native pointer in the target process (4 or 8).
    fn pointer_size(&self) -> usize {
        8
    }

    /// Allocates `size` bytes of zeroed scratch memory in the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot satisfy the allocation.
    fn alloc(&self, size: usize) -> Result<NativePtr>;

    /// Releases scratch memory obtained from [`alloc`](Self::alloc).
    ///
    /// Hosts whose scratch memory is garbage collected may keep the default no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if `ptr` is not a live allocation.
    fn free(&self, ptr: NativePtr) -> Result<()> {
        let _ = ptr;
        Ok(())
    }

    /// Reads `len` bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not readable.
    fn read(&self, address: NativePtr, len: usize) -> Result<Vec<u8>>;

    /// Writes `data` starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not writable.
    fn write(&self, address: NativePtr, data: &[u8]) -> Result<()>;

    /// Looks up a named export in `module`.
    fn find_export(&self, module: &str, name: &str) -> Option<NativePtr>;

    /// Lists every export of `module`.
    ///
    /// # Errors
    ///
    /// Returns an error if the module is not loaded or cannot be enumerated.
    fn enumerate_exports(&self, module: &str) -> Result<Vec<ExportEntry>>;

    /// Binds `address` with the given ABI signature into a callable.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot create a callable for the address.
    fn bind(
        &self,
        address: NativePtr,
        ret: NativeType,
        params: &[NativeType],
    ) -> Result<Arc<dyn NativeFunction>>;

    /// Returns the id of the native thread issuing the current call.
    fn current_thread_id(&self) -> u64;
}
