// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core runtime of a native plugin/module framework.
//!
//! A process-wide [`Context`] owns a set of dynamically loaded *modules* (see [`module`]),
//! coordinates their dependency graph (see [`graph`]), mediates access to typed symbols and
//! parameters they export, and provides a structured, per-call-stack *tracing* facility (see
//! [`tracing`]) that every module shares.
//!
//! Four pieces make up the crate:
//!
//! * [`graph`] — a standalone directed graph keyed by stable, recyclable ids. Used internally by
//!   the module registry's dependency graph, and exposed for callers with their own reachability
//!   or ordering queries.
//! * [`module`] — the registry, loading set, and unload protocol.
//! * [`tracing`] — call stacks, spans, events, and pluggable subscribers. Distinct from the
//!   ambient [`tracing`](https://docs.rs/tracing) crate this library uses for its own internal
//!   diagnostics (registry mutations, loading progress) — see each module's docs for the
//!   boundary.
//! * [`version`] and [`errors`] — the version-compatibility rule and the error taxonomy shared by
//!   the above.
//!
//! # Optional features
//!
//! * `proptest1`: implements [`proptest::arbitrary::Arbitrary`](https://docs.rs/proptest) for this
//!   crate's core value types, for callers writing their own property tests against it.

#![warn(missing_docs)]

pub mod errors;
pub mod graph;
pub mod module;
pub mod tracing;
pub mod version;

mod context;

#[cfg(test)]
mod unit_tests;

pub use context::{Context, ContextOption, BUILTIN_VERSION};
pub use errors::{Error, Result};
pub use version::Version;
