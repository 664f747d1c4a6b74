// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-module scenario tests and property-based suites.
//!
//! Per-type unit tests live alongside their implementation (`graph::tests`, `version::tests`,
//! `tracing::call_stack::tests`, `context::tests`, ...); this module covers behavior that spans
//! more than one of them: committing a [`crate::module::loading_set::LoadingSet`] into a live
//! registry, unloading through a [`crate::Context`], and the tracing thread-registration
//! lifecycle.

mod loading_set_scenarios;
mod tracing_thread_scenarios;

#[cfg(feature = "proptest1")]
mod proptest_suite;
