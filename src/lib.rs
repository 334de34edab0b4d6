// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # monoscope
//!
//! A bridge for driving an embedded Mono runtime from an instrumentation host.
//!
//! `monoscope` locates the runtime's exported C functions inside a running
//! process, binds them to typed callables, keeps the calling threads attached
//! to the runtime, and invokes managed methods with automatic marshalling of
//! arguments and results. Managed exceptions come back as structured errors and
//! custom attributes can be read straight from the runtime's own tables.
//!
//! ## Features
//!
//! - **Tolerant symbol resolution** - exact names, `_internal` suffixes, known
//!   aliases and a last-resort normalized match over the export table
//! - **Typed native calls** - every export is described by a declared signature,
//!   so calls are checked before they reach native code
//! - **Thread attachment** - each thread is attached to the root domain once,
//!   before its first managed call
//! - **Managed invocation** - primitives, strings and object handles in both
//!   directions, with exceptions surfaced as [`Error::ManagedInvocation`]
//! - **Custom attributes** - decoding of `MonoCustomAttrInfo` without loading
//!   any metadata
//!
//! ## Architecture
//!
//! The crate is layered bottom-up. Each layer only talks to the one below it:
//!
//! - [`host`] - The instrumentation environment: exports, memory, native calls
//! - [`signatures`] - Declared parameter and return types of runtime exports
//! - [`resolver`] - Finds the address of an export under any known spelling
//! - [`binder`] - Wraps resolved addresses into typed, cached callables
//! - [`thread`] - Attaches threads to the runtime's root domain
//! - [`invoke`] - Marshals host values and invokes managed methods
//! - [`attributes`] - Decodes custom attributes
//! - [`api`] - The [`MonoApi`] facade over all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use monoscope::prelude::*;
//!
//! let host = Arc::new(SimulatedHost::new("mono-2.0-bdwgc.dll"));
//! let api = MonoApi::new(host, MonoApiConfig::default());
//!
//! let domain = api.attach_thread(None)?;
//! println!("attached to domain {domain}");
//!
//! let method = api.method(NativePtr::new(0x7FFF_0000_1000));
//! match method.call_value(NativePtr::NULL, &[HostValue::from("input")]) {
//!     Ok(value) => println!("{} returned {value:?}", method.name()?),
//!     Err(Error::ManagedInvocation { type_name, message, .. }) => {
//!         eprintln!("managed code threw {type_name:?}: {message:?}");
//!     }
//!     Err(e) => return Err(e),
//! }
//!
//! api.shutdown();
//! # Ok::<(), monoscope::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Errors caused by the
//! caller (an unknown export, an argument of the wrong kind, a re-entrant call)
//! are kept apart from [`Error::ManagedInvocation`], which reports an exception
//! thrown by the instrumented application itself.
//!
//! ## Logging
//!
//! Diagnostics are emitted through [`tracing`] under targets of the form
//! `monoscope::<component>`. Install any subscriber to see them; without one,
//! logging costs nothing.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use monoscope::prelude::*;
///
/// let api = MonoApi::new(Arc::new(SimulatedHost::new("mono.dll")), MonoApiConfig::default());
/// let domain: NativePtr = api.root_domain()?;
/// # Ok::<(), monoscope::Error>(())
/// ```
pub mod prelude;

pub mod api;
pub mod attributes;
pub mod binder;
pub mod config;
pub mod host;
pub mod invoke;
pub mod resolver;
pub mod signatures;
pub mod thread;

/// `monoscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `monoscope` Error type
///
/// See [`Error`] for how programmer errors and managed exceptions
/// are told apart.
pub use error::Error;

/// Main entry point: the runtime facade and its method handle.
pub use api::{MonoApi, MonoMethod};

/// Configuration of every component.
pub use config::{AttributeConfig, Int64Mode, InvokeConfig, MonoApiConfig, ResolverConfig};

/// Addresses and raw values exchanged with the host.
pub use host::{HostEnvironment, NativePtr, NativeType, NativeValue};

/// Values passed into and returned from managed methods.
pub use invoke::{FromManagedValue, HostValue, ManagedValue, PrimitiveKind};

/// Decoded custom attributes.
pub use attributes::CustomAttributeRecord;
