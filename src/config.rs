//! Configuration of the runtime bridge.
//!
//! Configuration is organized into one container and one sub-configuration per
//! component:
//!
//! - [`MonoApiConfig`] - Top-level configuration container
//! - [`ResolverConfig`] - Target module and resolution stages
//! - [`InvokeConfig`] - Argument checking, 64-bit result mode, exception policy
//! - [`AttributeConfig`] - Limits for custom attribute decoding
//!
//! # Configuration Presets
//!
//! - [`MonoApiConfig::strict()`] - Exact names only, strict arity, exceptions raised
//! - [`MonoApiConfig::lenient()`] - Every resolution stage, lossy 64-bit results,
//!   managed exceptions reported as null results
//!
//! # Example
//!
//! ```rust
//! use monoscope::{InvokeConfig, MonoApiConfig, ResolverConfig};
//!
//! let config = MonoApiConfig {
//!     resolver: ResolverConfig::new("libmonosgen-2.0.so"),
//!     invoke: InvokeConfig::default().with_strict_arity(true),
//!     ..MonoApiConfig::default()
//! };
//! assert_eq!(config.resolver.module, "libmonosgen-2.0.so");
//! ```

use crate::resolver::ResolveStages;

/// Module name used when none is configured.
pub const DEFAULT_MODULE: &str = "mono-2.0-bdwgc.dll";

/// Top-level configuration passed to [`crate::MonoApi::new`].
#[derive(Clone, Debug, Default)]
pub struct MonoApiConfig {
    /// Symbol resolution settings.
    pub resolver: ResolverConfig,

    /// Invocation and marshalling settings.
    pub invoke: InvokeConfig,

    /// Custom attribute decoding settings.
    pub attributes: AttributeConfig,
}

impl MonoApiConfig {
    /// Only exact and aliased names are resolved; calls are checked strictly.
    ///
    /// Suited to runtimes whose build is known in advance, where a fuzzy match
    /// would more likely hide a mistake than fix one.
    #[must_use]
    pub fn strict() -> Self {
        MonoApiConfig {
            resolver: ResolverConfig::default()
                .with_stages(ResolveStages::PRIMARY | ResolveStages::ALIASES),
            invoke: InvokeConfig {
                strict_arity: true,
                throw_on_managed_exception: true,
                int64_mode: Int64Mode::Exact,
            },
            attributes: AttributeConfig::default(),
        }
    }

    /// Every resolution stage is enabled and managed exceptions do not abort callers.
    #[must_use]
    pub fn lenient() -> Self {
        MonoApiConfig {
            resolver: ResolverConfig::default().with_stages(ResolveStages::all()),
            invoke: InvokeConfig {
                strict_arity: false,
                throw_on_managed_exception: false,
                int64_mode: Int64Mode::Lossy,
            },
            attributes: AttributeConfig::default(),
        }
    }

    /// Sets the module that exports are resolved in.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.resolver.module = module.into();
        self
    }
}

/// Settings of the [`crate::resolver::SymbolResolver`].
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Name of the runtime module (for example `mono.dll` or `libmonosgen-2.0.so`).
    pub module: String,

    /// Which resolution stages are attempted, in their fixed order.
    pub stages: ResolveStages,
}

impl ResolverConfig {
    /// Creates a configuration for `module` with every stage enabled.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        ResolverConfig {
            module: module.into(),
            stages: ResolveStages::all(),
        }
    }

    /// Restricts the resolution stages.
    #[must_use]
    pub fn with_stages(mut self, stages: ResolveStages) -> Self {
        self.stages = stages;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODULE)
    }
}

/// How 64-bit integer results are surfaced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Int64Mode {
    /// Keep full 64-bit precision (`i64` / `u64`).
    #[default]
    Exact,
    /// Convert to `f64`, losing precision above 2^53.
    Lossy,
}

/// Settings of the [`crate::invoke::Invoker`].
#[derive(Clone, Debug)]
pub struct InvokeConfig {
    /// Reject calls that pass fewer arguments than the method declares.
    ///
    /// When disabled, missing trailing arguments are passed as null. Passing
    /// more arguments than declared is always rejected.
    pub strict_arity: bool,

    /// Raise [`crate::Error::ManagedInvocation`] for managed exceptions.
    ///
    /// When disabled, the exception is logged and the call yields a null result.
    pub throw_on_managed_exception: bool,

    /// Representation of 64-bit integer results.
    pub int64_mode: Int64Mode,
}

impl InvokeConfig {
    /// Sets [`strict_arity`](Self::strict_arity).
    #[must_use]
    pub fn with_strict_arity(mut self, strict: bool) -> Self {
        self.strict_arity = strict;
        self
    }

    /// Sets [`throw_on_managed_exception`](Self::throw_on_managed_exception).
    #[must_use]
    pub fn with_throw_on_managed_exception(mut self, throw: bool) -> Self {
        self.throw_on_managed_exception = throw;
        self
    }

    /// Sets [`int64_mode`](Self::int64_mode).
    #[must_use]
    pub fn with_int64_mode(mut self, mode: Int64Mode) -> Self {
        self.int64_mode = mode;
        self
    }
}

impl Default for InvokeConfig {
    fn default() -> Self {
        InvokeConfig {
            strict_arity: false,
            throw_on_managed_exception: true,
            int64_mode: Int64Mode::Exact,
        }
    }
}

/// Settings of the [`crate::attributes::CustomAttributeDecoder`].
#[derive(Clone, Debug)]
pub struct AttributeConfig {
    /// Entry counts above this are treated as a damaged `MonoCustomAttrInfo`.
    pub max_entries: usize,
}

impl AttributeConfig {
    /// Sets [`max_entries`](Self::max_entries).
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

impl Default for AttributeConfig {
    fn default() -> Self {
        AttributeConfig { max_entries: 4096 }
    }
}
