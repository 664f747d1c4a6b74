// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The public, refcounted handle callers hold onto a loaded module.

use crate::graph::NodeKey;
use crate::module::ModuleRegistry;
use crate::{Context, Result};

/// A refcounted handle to a loaded module (or a pseudo-module).
///
/// Cloning an `Info` is cheap (an `Arc` clone of the owning registry plus a copy of the node key).
/// The module itself is only actually torn down by [`ModuleInfo::unload`], not by dropping the
/// last `Info` — unload is always an explicit operation, matching the unload protocol.
#[derive(Clone, Debug)]
pub struct ModuleInfo {
    pub(crate) id: NodeKey,
    pub(crate) registry: ModuleRegistry,
}

impl ModuleInfo {
    pub(crate) fn new(id: NodeKey, registry: ModuleRegistry) -> Self {
        Self { id, registry }
    }

    /// This module's stable node id in the registry's dependency graph.
    pub fn id(&self) -> NodeKey {
        self.id
    }

    /// The module's name.
    pub fn name(&self) -> String {
        self.registry.with_record(self.id, |record| record.name.clone()).expect("module record missing for a live Info")
    }

    /// Unloads this module. See [`ModuleRegistry::unload`] for the full protocol.
    pub fn unload(&self, context: &Context) -> Result<()> {
        self.registry.unload(context, self.id)
    }
}
