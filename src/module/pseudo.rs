// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pseudo-modules: manifest-free registry entries for hosts that are not themselves modules.

use crate::module::export::ModuleConstructor;
use crate::module::info::ModuleInfo;
use crate::module::record::ModuleRecord;
use crate::module::ModuleRegistry;
use crate::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Debug, Default)]
struct NoopConstructor;

impl ModuleConstructor for NoopConstructor {
    fn construct(&self, _context: &Context, _info: &ModuleInfo) -> Result<Box<dyn Any + Send + Sync>> {
        Ok(Box::new(()))
    }
    fn destruct(&self, _context: &Context, _info: &ModuleInfo, _state: Box<dyn Any + Send + Sync>) {}
}

impl fmt::Debug for PseudoModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PseudoModule").field("name", &self.info.name()).finish()
    }
}

/// A registry entry with no exports and no static dependencies, for a host application that wants
/// to `acquire_dependency`, include namespaces, and `load_symbol` without itself being a loaded
/// module.
///
/// Unlike a manifest-declared module, a pseudo-module is registered directly — it never goes
/// through a [`crate::module::loading_set::LoadingSet`], since it has nothing to resolve against
/// the rest of the dependency graph at creation time.
pub struct PseudoModule {
    info: ModuleInfo,
}

impl PseudoModule {
    /// Registers a new pseudo-module named `name`.
    pub fn new(registry: &ModuleRegistry, name: impl Into<String>) -> Result<Self> {
        let record = Arc::new(ModuleRecord {
            name: name.into(),
            description: None,
            author: None,
            license: None,
            root: None,
            resources: IndexMap::new(),
            params: IndexMap::new(),
            imports: Mutex::new(IndexMap::new()),
            exports: Vec::new(),
            namespaces_static: IndexSet::new(),
            namespaces_dynamic: Mutex::new(IndexSet::new()),
            constructor: Arc::new(NoopConstructor),
            state: Mutex::new(Some(Box::new(()))),
            unload_lock: AtomicBool::new(false),
        });
        let id = registry.inner().write().register_module(record, &[])?;
        Ok(Self { info: ModuleInfo::new(id, registry.clone()) })
    }

    /// The handle other registry operations (`acquire_dependency`, `load_symbol`, ...) key on.
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Unloads this pseudo-module, releasing the caller's hold on the registry entry.
    pub fn destroy(self, context: &Context) -> Result<()> {
        self.info.unload(context)
    }
}
