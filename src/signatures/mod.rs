//! Declared native signatures of the Mono export catalog.
//!
//! Every export this crate calls is described by an [`ExportSignature`]: the
//! logical name callers use, the primary native symbol, alternative symbols the
//! export is known under in other builds, and its ABI types. The full catalog is a
//! [`SignatureTable`], built by merging the generated table (derived from the
//! public Mono headers) with a small manual-override table.
//!
//! # Merge rules
//!
//! - An override for an existing entry replaces its alias list when it carries
//!   aliases, and replaces its types when it carries a signature.
//! - An override for an unknown name adds a brand-new entry when it carries a
//!   signature; alias-only overrides for unknown names are ignored.
//!
//! Tables are immutable once built and shared as `Arc<SignatureTable>`, so several
//! resolvers (for example one per test with a fake table) can coexist.
//!
//! # Example
//!
//! ```rust
//! use monoscope::signatures::SignatureTable;
//!
//! let catalog = SignatureTable::default_catalog();
//! let root = catalog.get("mono_get_root_domain").unwrap();
//! assert!(root.aliases.iter().any(|alias| alias == "mono_get_root_domain_internal"));
//! ```

use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{host::NativeType, Result};

mod generated;
pub mod header;
pub mod manual;

/// The declared ABI of one logical export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSignature {
    /// Logical name used by callers
    pub name: String,
    /// Primary native symbol name
    pub native_name: String,
    /// Alternative native symbol names, tried in order
    pub aliases: Vec<String>,
    /// Return type
    pub ret: NativeType,
    /// Parameter types in declaration order
    pub params: Vec<NativeType>,
}

impl ExportSignature {
    /// Creates a signature whose native name equals its logical name.
    #[must_use]
    pub fn new(name: impl Into<String>, ret: NativeType, params: Vec<NativeType>) -> Self {
        let name = name.into();
        ExportSignature {
            native_name: name.clone(),
            name,
            aliases: Vec::new(),
            ret,
            params,
        }
    }

    /// Adds an alternative native name.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if alias != self.native_name && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    /// Overrides the primary native name.
    #[must_use]
    pub fn with_native_name(mut self, native_name: impl Into<String>) -> Self {
        self.native_name = native_name.into();
        self
    }
}

/// A manual correction or addition to the generated table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureOverride {
    /// Logical name the override applies to
    pub name: String,
    /// Replacement alias list (ignored when empty)
    pub aliases: Vec<String>,
    /// Replacement or new signature as `(return, parameters)`
    pub signature: Option<(NativeType, Vec<NativeType>)>,
}

impl SignatureOverride {
    /// Creates an alias-only override.
    #[must_use]
    pub fn aliases(name: impl Into<String>, aliases: &[&str]) -> Self {
        SignatureOverride {
            name: name.into(),
            aliases: aliases.iter().map(|alias| (*alias).to_string()).collect(),
            signature: None,
        }
    }

    /// Creates an override that declares a full signature.
    #[must_use]
    pub fn declare(name: impl Into<String>, ret: NativeType, params: &[NativeType]) -> Self {
        SignatureOverride {
            name: name.into(),
            aliases: Vec::new(),
            signature: Some((ret, params.to_vec())),
        }
    }

    /// Adds aliases to this override.
    #[must_use]
    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases
            .extend(aliases.iter().map(|alias| (*alias).to_string()));
        self
    }
}

/// Immutable catalog of export signatures keyed by logical name.
#[derive(Clone, Debug, Default)]
pub struct SignatureTable {
    entries: HashMap<String, Arc<ExportSignature>>,
}

impl SignatureTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from a list of signatures; the first entry per name wins.
    #[must_use]
    pub fn from_signatures(signatures: impl IntoIterator<Item = ExportSignature>) -> Self {
        let mut entries = HashMap::new();
        for signature in signatures {
            entries
                .entry(signature.name.clone())
                .or_insert_with(|| Arc::new(signature));
        }
        SignatureTable { entries }
    }

    /// The table generated from the public Mono headers.
    #[must_use]
    pub fn generated() -> Self {
        Self::from_signatures(
            generated::GENERATED
                .iter()
                .map(|(name, ret, params)| ExportSignature::new(*name, *ret, params.to_vec())),
        )
    }

    /// The generated table merged with the built-in manual overrides.
    #[must_use]
    pub fn default_catalog() -> Self {
        Self::generated().merge(manual::overrides())
    }

    /// Builds a table from C header sources containing `MONO_API` declarations.
    ///
    /// `@alias` annotations found in the headers are applied as overrides.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a header cannot be parsed.
    pub fn from_headers<'a>(sources: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut parser = header::HeaderParser::new();
        for source in sources {
            parser.feed(source)?;
        }
        let parsed = parser.finish();

        // Aliases accumulate per owner across all headers
        let mut overrides: Vec<SignatureOverride> = Vec::new();
        for (owner, alias) in parsed.aliases {
            match overrides.iter_mut().find(|existing| existing.name == owner) {
                Some(existing) => existing.aliases.push(alias),
                None => overrides.push(SignatureOverride {
                    name: owner,
                    aliases: vec![alias],
                    signature: None,
                }),
            }
        }

        Ok(Self::from_signatures(parsed.signatures).merge(overrides))
    }

    /// Applies `overrides` on top of this table.
    #[must_use]
    pub fn merge(mut self, overrides: impl IntoIterator<Item = SignatureOverride>) -> Self {
        for item in overrides {
            match self.entries.get(&item.name) {
                Some(existing) => {
                    let mut updated = ExportSignature::clone(existing);
                    if !item.aliases.is_empty() {
                        updated.aliases.clear();
                        for alias in item.aliases {
                            updated = updated.with_alias(alias);
                        }
                    }
                    if let Some((ret, params)) = item.signature {
                        updated.ret = ret;
                        updated.params = params;
                    }
                    self.entries.insert(item.name, Arc::new(updated));
                }
                None => match item.signature {
                    Some((ret, params)) => {
                        let mut signature = ExportSignature::new(item.name.clone(), ret, params);
                        for alias in item.aliases {
                            signature = signature.with_alias(alias);
                        }
                        self.entries.insert(item.name, Arc::new(signature));
                    }
                    None => {
                        debug!(
                            target: "monoscope::signatures",
                            name = %item.name,
                            "ignoring alias-only override for undeclared export"
                        );
                    }
                },
            }
        }
        self
    }

    /// Inserts or replaces a single signature.
    pub fn insert(&mut self, signature: ExportSignature) {
        self.entries
            .insert(signature.name.clone(), Arc::new(signature));
    }

    /// Looks up the signature declared for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ExportSignature>> {
        self.entries.get(name)
    }

    /// Returns `true` if `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of declared exports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates all signatures in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ExportSignature>> {
        self.entries.values()
    }
}
