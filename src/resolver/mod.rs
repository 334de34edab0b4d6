//! Name to address resolution for runtime exports.
//!
//! Mono builds disagree on what their exports are called: public entry points
//! get an `_internal` twin or are replaced by it, Unity renames a handful, and
//! some toolchains decorate or re-case symbol names. [`SymbolResolver`] hides all
//! of this behind the logical names of the [`SignatureTable`].
//!
//! # Resolution Order
//!
//! 1. The write-once address cache
//! 2. The primary declared native name
//! 3. Each alias, in declared order
//! 4. A scan of the module's export list comparing normalized names (`_` and `-`
//!    removed, ASCII case folded) against the primary name, then each alias
//! 5. A substring fallback over the same list: the shortest export whose
//!    normalized name contains a normalized candidate wins
//!
//! Stages 2 to 5 can be switched off individually with [`ResolveStages`]. Names
//! without a declared signature are looked up as their own primary name.
//!
//! The module's export list is enumerated at most once per resolver, on the
//! first lookup that needs it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use monoscope::host::simulated::SimulatedHost;
//! use monoscope::resolver::SymbolResolver;
//! use monoscope::signatures::SignatureTable;
//! use monoscope::ResolverConfig;
//!
//! let host = SimulatedHost::new("mono.dll");
//! let address = host.define_symbol("mono_get_root_domain_internal");
//!
//! let resolver = SymbolResolver::new(
//!     Arc::new(host),
//!     Arc::new(SignatureTable::default_catalog()),
//!     ResolverConfig::new("mono.dll"),
//! );
//! assert_eq!(resolver.resolve("mono_get_root_domain")?, address);
//! # Ok::<(), monoscope::Error>(())
//! ```

use std::sync::{Arc, OnceLock};

use bitflags::bitflags;
use dashmap::DashMap;
use strum::Display;
use tracing::{debug, trace, warn};

use crate::{
    config::ResolverConfig,
    host::{HostEnvironment, NativePtr},
    signatures::SignatureTable,
    Error, Result,
};

bitflags! {
    /// Selects which resolution stages a [`SymbolResolver`] attempts.
    ///
    /// The cache is always consulted; the stages run in declaration order.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ResolveStages: u8 {
        /// Look up the primary declared native name.
        const PRIMARY = 0x01;
        /// Look up each declared alias.
        const ALIASES = 0x02;
        /// Compare normalized names against the module's export list.
        const NORMALIZED = 0x04;
        /// Substring match against the module's export list.
        const FUZZY = 0x08;
    }
}

impl Default for ResolveStages {
    fn default() -> Self {
        ResolveStages::all()
    }
}

/// The stage that produced an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ResolutionStage {
    /// Exact primary name
    Primary,
    /// Declared alias
    Alias,
    /// Normalized name comparison
    Normalized,
    /// Substring fallback
    Fuzzy,
}

/// One export of the module with its normalized name.
#[derive(Debug)]
struct SnapshotEntry {
    name: String,
    normalized: String,
    address: NativePtr,
}

/// Resolves logical export names to addresses in the runtime module.
///
/// Successful resolutions are cached for the lifetime of the resolver; a cached
/// address is authoritative and never invalidated.
pub struct SymbolResolver {
    host: Arc<dyn HostEnvironment>,
    signatures: Arc<SignatureTable>,
    config: ResolverConfig,
    cache: DashMap<String, NativePtr>,
    snapshot: OnceLock<Vec<SnapshotEntry>>,
}

impl SymbolResolver {
    /// Creates a resolver over `host` using the given signature catalog.
    #[must_use]
    pub fn new(
        host: Arc<dyn HostEnvironment>,
        signatures: Arc<SignatureTable>,
        config: ResolverConfig,
    ) -> Self {
        SymbolResolver {
            host,
            signatures,
            config,
            cache: DashMap::new(),
            snapshot: OnceLock::new(),
        }
    }

    /// Resolves `name`, failing if no stage finds it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SymbolResolution`] if the export cannot be found.
    pub fn resolve(&self, name: &str) -> Result<NativePtr> {
        self.try_resolve(name)
            .ok_or_else(|| Error::SymbolResolution {
                symbol: name.to_string(),
                module: self.config.module.clone(),
            })
    }

    /// Resolves `name`, returning `None` if no stage finds it.
    #[must_use]
    pub fn try_resolve(&self, name: &str) -> Option<NativePtr> {
        if name.is_empty() {
            return None;
        }
        if let Some(address) = self.cache.get(name) {
            return Some(*address);
        }

        let Some((address, stage)) = self.locate(name) else {
            trace!(target: "monoscope::resolver", name, "export not found");
            return None;
        };

        if stage != ResolutionStage::Primary {
            debug!(
                target: "monoscope::resolver",
                name,
                %stage,
                %address,
                "resolved through fallback stage"
            );
        }

        // First writer wins; a racing resolution of the same name is discarded
        Some(*self.cache.entry(name.to_string()).or_insert(address))
    }

    /// Returns `true` if `name` can be resolved. Never fails.
    #[must_use]
    pub fn has_export(&self, name: &str) -> bool {
        self.try_resolve(name).is_some()
    }

    /// Returns the cached address of `name` without attempting resolution.
    #[must_use]
    pub fn cached(&self, name: &str) -> Option<NativePtr> {
        self.cache.get(name).map(|address| *address)
    }

    /// Number of cached resolutions.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolves every name in `names` and returns the ones that failed.
    ///
    /// Intended for diagnostics when targeting an unfamiliar runtime build.
    pub fn resolve_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        names
            .into_iter()
            .filter(|name| !self.has_export(name))
            .map(str::to_string)
            .collect()
    }

    /// Name of the module exports are resolved in.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.config.module
    }

    /// The signature catalog this resolver uses.
    #[must_use]
    pub fn signatures(&self) -> &Arc<SignatureTable> {
        &self.signatures
    }

    /// The host this resolver uses.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn HostEnvironment> {
        &self.host
    }

    fn locate(&self, name: &str) -> Option<(NativePtr, ResolutionStage)> {
        let signature = self.signatures.get(name);
        let primary = signature.map_or(name, |sig| sig.native_name.as_str());
        let aliases: &[String] = signature.map_or(&[], |sig| sig.aliases.as_slice());
        let stages = self.config.stages;
        let module = self.config.module.as_str();

        if stages.contains(ResolveStages::PRIMARY) {
            if let Some(address) = self.host.find_export(module, primary) {
                return Some((address, ResolutionStage::Primary));
            }
        }

        if stages.contains(ResolveStages::ALIASES) {
            for alias in aliases {
                if let Some(address) = self.host.find_export(module, alias) {
                    return Some((address, ResolutionStage::Alias));
                }
            }
        }

        if !stages.intersects(ResolveStages::NORMALIZED | ResolveStages::FUZZY) {
            return None;
        }

        let candidates: Vec<String> = std::iter::once(primary)
            .chain(aliases.iter().map(String::as_str))
            .map(normalize)
            .filter(|candidate| !candidate.is_empty())
            .collect();
        let snapshot = self.snapshot();

        if stages.contains(ResolveStages::NORMALIZED) {
            for candidate in &candidates {
                if let Some(entry) = snapshot.iter().find(|entry| &entry.normalized == candidate) {
                    return Some((entry.address, ResolutionStage::Normalized));
                }
            }
        }

        if stages.contains(ResolveStages::FUZZY) {
            for candidate in &candidates {
                if let Some(entry) = snapshot
                    .iter()
                    .filter(|entry| entry.normalized.contains(candidate.as_str()))
                    .min_by_key(|entry| entry.normalized.len())
                {
                    warn!(
                        target: "monoscope::resolver",
                        name,
                        export = %entry.name,
                        "export matched by substring; verify the runtime build"
                    );
                    return Some((entry.address, ResolutionStage::Fuzzy));
                }
            }
        }

        None
    }

    fn snapshot(&self) -> &[SnapshotEntry] {
        self.snapshot.get_or_init(|| {
            match self.host.enumerate_exports(&self.config.module) {
                Ok(exports) => exports
                    .into_iter()
                    .map(|export| SnapshotEntry {
                        normalized: normalize(&export.name),
                        name: export.name,
                        address: export.address,
                    })
                    .collect(),
                Err(error) => {
                    warn!(
                        target: "monoscope::resolver",
                        module = %self.config.module,
                        %error,
                        "export enumeration failed; only exact names can be resolved"
                    );
                    Vec::new()
                }
            }
        })
    }
}

/// Removes `_` and `-` and folds ASCII case.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::{simulated::SimulatedHost, NativeType},
        signatures::ExportSignature,
    };

    fn resolver_with(host: &SimulatedHost, stages: ResolveStages) -> SymbolResolver {
        SymbolResolver::new(
            Arc::new(host.clone()),
            Arc::new(SignatureTable::default_catalog()),
            ResolverConfig::new("mono.dll").with_stages(stages),
        )
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Mono_Get-Root_Domain"), "monogetrootdomain");
        assert_eq!(normalize("_-_"), "");
    }

    #[test]
    fn test_primary_is_cached() {
        let host = SimulatedHost::new("mono.dll");
        let address = host.define_symbol("mono_thread_attach");
        let resolver = resolver_with(&host, ResolveStages::all());

        assert_eq!(resolver.resolve("mono_thread_attach").unwrap(), address);
        let lookups = host.find_export_count();
        assert_eq!(resolver.resolve("mono_thread_attach").unwrap(), address);
        assert_eq!(host.find_export_count(), lookups);
        assert_eq!(resolver.cached("mono_thread_attach"), Some(address));
        assert_eq!(resolver.cache_len(), 1);
        assert_eq!(host.enumerate_count(), 0);
    }

    #[test]
    fn test_alias_only_export() {
        let host = SimulatedHost::new("mono.dll");
        let address = host.define_symbol("mono_get_root_domain_internal");
        let resolver = resolver_with(&host, ResolveStages::all());

        assert_eq!(resolver.resolve("mono_get_root_domain").unwrap(), address);
        let (lookups, scans) = (host.find_export_count(), host.enumerate_count());

        assert_eq!(resolver.resolve("mono_get_root_domain").unwrap(), address);
        assert_eq!(host.find_export_count(), lookups);
        assert_eq!(host.enumerate_count(), scans);
    }

    #[test]
    fn test_normalized_match() {
        let host = SimulatedHost::new("mono.dll");
        let address = host.define_symbol("Mono-Class-Get-Name");
        let resolver = resolver_with(&host, ResolveStages::all());

        assert_eq!(resolver.resolve("mono_class_get_name").unwrap(), address);
    }

    #[test]
    fn test_fuzzy_prefers_shortest() {
        let host = SimulatedHost::new("mono.dll");
        host.define_symbol("_mono_string_new_wrapper_ex@12");
        let short = host.define_symbol("_mono_string_new@8");
        let resolver = resolver_with(&host, ResolveStages::all());

        assert_eq!(resolver.resolve("mono_string_new").unwrap(), short);
    }

    #[test]
    fn test_stages_restrict_resolution() {
        let host = SimulatedHost::new("mono.dll");
        host.define_symbol("MonoClassGetName");
        host.define_symbol("mono_thread_attach_internal");
        let resolver = resolver_with(&host, ResolveStages::PRIMARY);

        assert!(!resolver.has_export("mono_class_get_name"));
        assert!(!resolver.has_export("mono_thread_attach"));
        assert_eq!(host.enumerate_count(), 0);
    }

    #[test]
    fn test_snapshot_enumerated_once() {
        let host = SimulatedHost::new("mono.dll");
        host.define_symbol("MonoClassGetName");
        let resolver = resolver_with(&host, ResolveStages::all());

        assert!(resolver.has_export("mono_class_get_name"));
        assert!(!resolver.has_export("mono_class_get_namespace"));
        assert!(!resolver.has_export("no_such_export_anywhere"));
        assert_eq!(host.enumerate_count(), 1);
    }

    #[test]
    fn test_missing_export() {
        let host = SimulatedHost::new("mono.dll");
        let resolver = resolver_with(&host, ResolveStages::all());

        assert!(!resolver.has_export(""));
        assert!(!resolver.has_export("_"));
        assert!(resolver.try_resolve("mono_jit_init").is_none());

        match resolver.resolve("mono_jit_init") {
            Err(Error::SymbolResolution { symbol, module }) => {
                assert_eq!(symbol, "mono_jit_init");
                assert_eq!(module, "mono.dll");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(resolver.cache_len(), 0);
    }

    #[test]
    fn test_wrong_module() {
        let host = SimulatedHost::new("mono.dll");
        host.define_symbol("mono_jit_init");
        let resolver = SymbolResolver::new(
            Arc::new(host.clone()),
            Arc::new(SignatureTable::new()),
            ResolverConfig::new("libmonosgen-2.0.so"),
        );

        assert!(!resolver.has_export("mono_jit_init"));
    }

    #[test]
    fn test_undeclared_name_uses_own_name() {
        let host = SimulatedHost::new("mono.dll");
        let address = host.define_symbol("il2cpp_domain_get");
        let resolver = resolver_with(&host, ResolveStages::all());

        assert_eq!(resolver.resolve("il2cpp_domain_get").unwrap(), address);
    }

    #[test]
    fn test_native_name_differs_from_logical_name() {
        let host = SimulatedHost::new("mono.dll");
        let address = host.define_symbol("mono_unity_thread_fast_attach");
        let mut table = SignatureTable::new();
        table.insert(
            ExportSignature::new("fast_attach", NativeType::Void, vec![NativeType::Pointer])
                .with_native_name("mono_unity_thread_fast_attach"),
        );
        let resolver = SymbolResolver::new(
            Arc::new(host),
            Arc::new(table),
            ResolverConfig::new("mono.dll"),
        );

        assert_eq!(resolver.resolve("fast_attach").unwrap(), address);
    }

    #[test]
    fn test_resolve_all_reports_failures() {
        let host = SimulatedHost::new("mono.dll");
        host.define_symbol("mono_thread_attach");
        let resolver = resolver_with(&host, ResolveStages::PRIMARY | ResolveStages::ALIASES);

        let missing = resolver.resolve_all(["mono_thread_attach", "mono_thread_detach"]);
        assert_eq!(missing, vec!["mono_thread_detach".to_string()]);
    }
}
