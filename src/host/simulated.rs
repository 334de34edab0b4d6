//! In-process simulation of a host instrumentation environment.
//!
//! [`SimulatedHost`] implements [`HostEnvironment`] without a target process. It
//! provides a simulated address space for scratch memory and an export table whose
//! entries are backed by Rust closures. It is what the crate's own tests and
//! benchmarks run against, and it is useful for exercising code built on top of
//! [`crate::MonoApi`] without attaching to a real game.
//!
//! # Address Space
//!
//! Each allocation gets a unique base address in a simulated address space
//! (starting at `0x7FFF_0000_0000`, or `0x4000_0000` for 32-bit processes),
//! aligned to 16 bytes. Exported functions live
//! in a separate range starting at `0x1000_0000`. Neither corresponds to real
//! process memory.
//!
//! # Example
//!
//! ```rust
//! use monoscope::host::{
//!     simulated::SimulatedHost, HostEnvironment, NativePtr, NativeType, NativeValue,
//! };
//!
//! let host = SimulatedHost::new("mono.dll");
//! let address = host.define_export("mono_get_root_domain", |_host, _args| {
//!     Ok(NativeValue::Pointer(NativePtr::new(0xD0)))
//! });
//!
//! let function = host.bind(address, NativeType::Pointer, &[]).unwrap();
//! assert_eq!(function.call(&[]).unwrap(), NativeValue::Pointer(NativePtr::new(0xD0)));
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, RwLock,
    },
};

use dashmap::DashMap;

use crate::{
    host::{ExportEntry, HostEnvironment, NativeFunction, NativePtr, NativeType, NativeValue},
    Error, Result,
};

/// Closure implementing a simulated native export.
pub type NativeHandler =
    Arc<dyn Fn(&SimulatedHost, &[NativeValue]) -> Result<NativeValue> + Send + Sync>;

const HEAP_BASE: u64 = 0x7FFF_0000_0000;
const HEAP_BASE_32: u64 = 0x4000_0000;
const CODE_BASE: u64 = 0x1000_0000;
const CODE_STRIDE: u64 = 0x40;

/// An allocated region of simulated memory.
#[derive(Clone, Debug)]
struct Region {
    data: Vec<u8>,
}

/// Simulated memory for scratch allocations.
#[derive(Debug)]
struct SimulatedMemory {
    /// Memory regions indexed by their base address.
    regions: BTreeMap<u64, Region>,
    /// Next address to allocate.
    next_address: u64,
    /// Total bytes currently allocated.
    current_size: usize,
    /// Maximum allowed allocation.
    max_size: usize,
}

impl SimulatedMemory {
    fn new(base: u64, max_size: usize) -> Self {
        SimulatedMemory {
            regions: BTreeMap::new(),
            next_address: base,
            current_size: 0,
            max_size,
        }
    }

    fn alloc(&mut self, size: usize) -> Result<u64> {
        if self.current_size + size > self.max_size {
            return Err(Error::MemoryLimitExceeded {
                current: self.current_size,
                limit: self.max_size,
            });
        }

        let address = self.next_address;
        // Zero-sized allocations still get a distinct address
        self.next_address += size.max(1) as u64;
        self.next_address = (self.next_address + 15) & !15;

        self.regions.insert(
            address,
            Region {
                data: vec![0; size],
            },
        );
        self.current_size += size;

        Ok(address)
    }

    fn free(&mut self, address: u64) -> Result<()> {
        match self.regions.remove(&address) {
            Some(region) => {
                self.current_size = self.current_size.saturating_sub(region.data.len());
                Ok(())
            }
            None => Err(Error::InvalidPointer {
                address,
                reason: "not a valid allocation or already freed",
            }),
        }
    }

    fn locate(&self, address: u64, len: usize) -> Result<(u64, usize)> {
        let (&base, region) =
            self.regions
                .range(..=address)
                .next_back()
                .ok_or(Error::InvalidPointer {
                    address,
                    reason: "address not in any allocated region",
                })?;

        #[allow(clippy::cast_possible_truncation)] // bounded by the region size check below
        let offset = (address - base) as usize;
        if offset >= region.data.len().max(1) || offset + len > region.data.len() {
            return Err(Error::InvalidPointer {
                address,
                reason: "access would exceed region bounds",
            });
        }

        Ok((base, offset))
    }

    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let (base, offset) = self.locate(address, len)?;
        Ok(self.regions[&base].data[offset..offset + len].to_vec())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<()> {
        let (base, offset) = self.locate(address, data.len())?;
        if let Some(region) = self.regions.get_mut(&base) {
            region.data[offset..offset + data.len()].copy_from_slice(data);
        }
        Ok(())
    }
}

struct HostState {
    module: String,
    pointer_size: usize,
    memory: Mutex<SimulatedMemory>,
    exports: RwLock<Vec<ExportEntry>>,
    handlers: DashMap<u64, (String, NativeHandler)>,
    next_code: AtomicU64,
    thread_id: AtomicU64,
    calls: Mutex<HashMap<String, usize>>,
    find_export_calls: AtomicUsize,
    enumerate_calls: AtomicUsize,
    bind_calls: AtomicUsize,
}

/// A [`HostEnvironment`] backed by simulated memory and closure-implemented exports.
///
/// Cloning is cheap and yields a handle to the same simulated process.
#[derive(Clone)]
pub struct SimulatedHost {
    state: Arc<HostState>,
}

impl SimulatedHost {
    /// Creates a 64-bit simulated process with a single loaded module.
    ///
    /// # Arguments
    ///
    /// * `module` - Name of the module that exports are registered in
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self::with_pointer_size(module, 8)
    }

    /// Creates a simulated process with the given pointer width (4 or 8).
    #[must_use]
    pub fn with_pointer_size(module: impl Into<String>, pointer_size: usize) -> Self {
        let heap_base = if pointer_size == 4 { HEAP_BASE_32 } else { HEAP_BASE };
        SimulatedHost {
            state: Arc::new(HostState {
                module: module.into(),
                pointer_size,
                // Default to 16MB of scratch memory
                memory: Mutex::new(SimulatedMemory::new(heap_base, 16 * 1024 * 1024)),
                exports: RwLock::new(Vec::new()),
                handlers: DashMap::new(),
                next_code: AtomicU64::new(CODE_BASE),
                thread_id: AtomicU64::new(1),
                calls: Mutex::new(HashMap::new()),
                find_export_calls: AtomicUsize::new(0),
                enumerate_calls: AtomicUsize::new(0),
                bind_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Name of the simulated module.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.state.module
    }

    /// Registers an exported function implemented by `handler`.
    ///
    /// # Returns
    ///
    /// The address assigned to the export.
    pub fn define_export<F>(&self, name: &str, handler: F) -> NativePtr
    where
        F: Fn(&SimulatedHost, &[NativeValue]) -> Result<NativeValue> + Send + Sync + 'static,
    {
        let address = self.define_symbol(name);
        let handler: NativeHandler = Arc::new(handler);
        self.state
            .handlers
            .insert(address.address(), (name.to_string(), handler));
        address
    }

    /// Registers an export without code behind it.
    ///
    /// Useful for resolution tests; binding such an address fails.
    pub fn define_symbol(&self, name: &str) -> NativePtr {
        let next = self.state.next_code.fetch_add(CODE_STRIDE, Ordering::Relaxed);
        let address = NativePtr::new(next);
        write_lock!(self.state.exports).push(ExportEntry::new(name, address));
        address
    }

    /// Sets the thread id reported by [`HostEnvironment::current_thread_id`].
    pub fn set_current_thread_id(&self, thread_id: u64) {
        self.state.thread_id.store(thread_id, Ordering::Relaxed);
    }

    /// Allocates memory and fills it with `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemoryLimitExceeded`] if the allocation does not fit.
    pub fn alloc_with_data(&self, data: &[u8]) -> Result<NativePtr> {
        let mut memory = lock!(self.state.memory);
        let address = memory.alloc(data.len())?;
        memory.write(address, data)?;
        Ok(NativePtr::new(address))
    }

    /// Returns `true` if `address` lies inside a live allocation.
    #[must_use]
    pub fn is_valid(&self, address: NativePtr) -> bool {
        lock!(self.state.memory).locate(address.address(), 0).is_ok()
    }

    /// Number of bytes currently allocated.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        lock!(self.state.memory).current_size
    }

    /// Number of live allocations.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        lock!(self.state.memory).regions.len()
    }

    /// How often the export named `name` has been called through a bound function.
    #[must_use]
    pub fn call_count(&self, name: &str) -> usize {
        lock!(self.state.calls).get(name).copied().unwrap_or(0)
    }

    /// Total number of calls into any export.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        lock!(self.state.calls).values().sum()
    }

    /// How often [`HostEnvironment::enumerate_exports`] has been called.
    #[must_use]
    pub fn enumerate_count(&self) -> usize {
        self.state.enumerate_calls.load(Ordering::Relaxed)
    }

    /// How often [`HostEnvironment::find_export`] has been called.
    #[must_use]
    pub fn find_export_count(&self) -> usize {
        self.state.find_export_calls.load(Ordering::Relaxed)
    }

    /// How often [`HostEnvironment::bind`] has been called.
    #[must_use]
    pub fn bind_count(&self) -> usize {
        self.state.bind_calls.load(Ordering::Relaxed)
    }

    fn module_matches(&self, module: &str) -> bool {
        module.eq_ignore_ascii_case(&self.state.module)
    }
}

impl HostEnvironment for SimulatedHost {
    fn pointer_size(&self) -> usize {
        self.state.pointer_size
    }

    fn alloc(&self, size: usize) -> Result<NativePtr> {
        lock!(self.state.memory).alloc(size).map(NativePtr::new)
    }

    fn free(&self, ptr: NativePtr) -> Result<()> {
        lock!(self.state.memory).free(ptr.address())
    }

    fn read(&self, address: NativePtr, len: usize) -> Result<Vec<u8>> {
        lock!(self.state.memory).read(address.address(), len)
    }

    fn write(&self, address: NativePtr, data: &[u8]) -> Result<()> {
        lock!(self.state.memory).write(address.address(), data)
    }

    fn find_export(&self, module: &str, name: &str) -> Option<NativePtr> {
        self.state.find_export_calls.fetch_add(1, Ordering::Relaxed);
        if !self.module_matches(module) {
            return None;
        }

        read_lock!(self.state.exports)
            .iter()
            .find(|export| export.name == name)
            .map(|export| export.address)
    }

    fn enumerate_exports(&self, module: &str) -> Result<Vec<ExportEntry>> {
        self.state.enumerate_calls.fetch_add(1, Ordering::Relaxed);
        if !self.module_matches(module) {
            return Err(Error::Host(format!("module '{module}' is not loaded")));
        }

        Ok(read_lock!(self.state.exports).clone())
    }

    fn bind(
        &self,
        address: NativePtr,
        ret: NativeType,
        params: &[NativeType],
    ) -> Result<Arc<dyn NativeFunction>> {
        self.state.bind_calls.fetch_add(1, Ordering::Relaxed);
        let Some(entry) = self.state.handlers.get(&address.address()) else {
            return Err(Error::Host(format!("no native code at {address}")));
        };
        let (name, handler) = entry.value().clone();

        Ok(Arc::new(SimulatedFunction {
            host: self.clone(),
            name,
            handler,
            ret,
            params: params.to_vec(),
        }))
    }

    fn current_thread_id(&self) -> u64 {
        self.state.thread_id.load(Ordering::Relaxed)
    }
}

/// A bound simulated export.
struct SimulatedFunction {
    host: SimulatedHost,
    name: String,
    handler: NativeHandler,
    ret: NativeType,
    params: Vec<NativeType>,
}

impl NativeFunction for SimulatedFunction {
    fn call(&self, args: &[NativeValue]) -> Result<NativeValue> {
        if args.len() != self.params.len() {
            return Err(Error::Host(format!(
                "{}: expected {} arguments, got {}",
                self.name,
                self.params.len(),
                args.len()
            )));
        }

        if let Some((index, _)) = args
            .iter()
            .zip(&self.params)
            .enumerate()
            .find(|(_, (arg, ty))| !arg.fits(**ty))
        {
            return Err(Error::Host(format!(
                "{}: argument {index} does not match {}",
                self.name, self.params[index]
            )));
        }

        *lock!(self.host.state.calls)
            .entry(self.name.clone())
            .or_insert(0) += 1;

        let result = (self.handler)(&self.host, args)?;
        if self.ret == NativeType::Void || result.fits(self.ret) {
            Ok(if self.ret == NativeType::Void {
                NativeValue::Void
            } else {
                result
            })
        } else {
            Err(Error::Host(format!(
                "{}: handler returned {result:?} for declared {}",
                self.name, self.ret
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_free() {
        let host = SimulatedHost::new("mono.dll");

        let ptr = host.alloc(100).unwrap();
        assert!(host.is_valid(ptr));

        host.free(ptr).unwrap();
        assert!(!host.is_valid(ptr));
        assert!(host.free(ptr).is_err());
    }

    #[test]
    fn test_offset_access() {
        let host = SimulatedHost::new("mono.dll");

        let ptr = host.alloc(32).unwrap();
        host.write(ptr.add(8), &[0xAB, 0xCD]).unwrap();

        assert_eq!(host.read(ptr.add(8), 2).unwrap(), [0xAB, 0xCD]);
    }

    #[test]
    fn test_out_of_bounds() {
        let host = SimulatedHost::new("mono.dll");

        let ptr = host.alloc(8).unwrap();
        assert!(host.read(ptr, 16).is_err());
        assert!(host.write(ptr, &[0; 16]).is_err());
        assert!(host.read(NativePtr::new(0x10), 1).is_err());
    }

    #[test]
    fn test_memory_limit() {
        let host = SimulatedHost::new("mono.dll");
        assert!(host.alloc(32 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_exports() {
        let host = SimulatedHost::new("mono.dll");
        let address = host.define_symbol("mono_jit_init");

        assert_eq!(host.find_export("mono.dll", "mono_jit_init"), Some(address));
        assert_eq!(host.find_export("MONO.DLL", "mono_jit_init"), Some(address));
        assert_eq!(host.find_export("other.dll", "mono_jit_init"), None);
        assert_eq!(host.enumerate_exports("mono.dll").unwrap().len(), 1);
        assert!(host.enumerate_exports("other.dll").is_err());
        assert!(host.bind(address, NativeType::Void, &[]).is_err());
    }

    #[test]
    fn test_bound_call_checks_arguments() {
        let host = SimulatedHost::new("mono.dll");
        let address = host.define_export("add", |_host, args| match args {
            [NativeValue::I32(a), NativeValue::I32(b)] => Ok(NativeValue::I32(a + b)),
            _ => Err(Error::Host("bad args".to_string())),
        });

        let add = host
            .bind(address, NativeType::I32, &[NativeType::I32, NativeType::I32])
            .unwrap();

        let sum = add.call(&[NativeValue::I32(2), NativeValue::I32(3)]).unwrap();
        assert_eq!(sum, NativeValue::I32(5));
        assert!(add.call(&[NativeValue::I32(2)]).is_err());
        assert!(add.call(&[NativeValue::I32(2), NativeValue::U32(3)]).is_err());
        assert_eq!(host.call_count("add"), 1);
    }
}
