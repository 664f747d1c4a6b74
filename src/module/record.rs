// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The registry's internal per-module bookkeeping.

use crate::graph::NodeKey;
use crate::module::export::ModuleConstructor;
use crate::module::parameter::Parameter;
use crate::version::Version;
use camino::Utf8PathBuf;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Why a dependency edge exists between two modules in the registry's graph.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DependencyKind {
    /// Declared in the dependent's manifest; cannot be relinquished through the API.
    Static,
    /// Acquired at run time through `acquire_dependency`.
    Dynamic,
}

/// A module's state as stored in the registry, behind its dependency graph node.
pub(crate) struct ModuleRecord {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) license: Option<String>,
    pub(crate) root: Option<Utf8PathBuf>,
    pub(crate) resources: IndexMap<String, Utf8PathBuf>,
    pub(crate) params: IndexMap<String, Parameter>,
    /// `(name, namespace) -> (version, exporting module)`, resolved at load time.
    pub(crate) imports: Mutex<IndexMap<(String, String), (Version, NodeKey)>>,
    /// Symbols this module owns, for removal from the registry's symbol table on unload.
    pub(crate) exports: Vec<(String, String, Version)>,
    pub(crate) namespaces_static: IndexSet<String>,
    pub(crate) namespaces_dynamic: Mutex<IndexSet<String>>,
    pub(crate) constructor: Arc<dyn ModuleConstructor>,
    pub(crate) state: Mutex<Option<Box<dyn Any + Send + Sync>>>,
    /// CAS lock guarding `unload`: `false` = free, `true` = an unload is in progress (or the
    /// module has already been unloaded and is pending removal).
    pub(crate) unload_lock: AtomicBool,
}

impl ModuleRecord {
    /// True iff `ns` is included, whether statically or dynamically, or is the implicit empty
    /// namespace.
    pub(crate) fn namespace_included(&self, ns: &str) -> bool {
        ns.is_empty() || self.namespaces_static.contains(ns) || self.namespaces_dynamic.lock().contains(ns)
    }
}
