// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The safe-unload protocol: destructor, graph teardown, symbol/namespace/parameter release.

use crate::errors::{Error, Result};
use crate::graph::{Direction, NodeKey};
use crate::module::info::ModuleInfo;
use crate::module::ModuleRegistry;
use crate::Context;
use std::sync::atomic::Ordering;

/// Unloads a single module.
///
/// 1. Acquire the unload lock (CAS on `ModuleRecord::unload_lock`); fail with [`Error::Permission`]
///    if already locked, or if the module still has dependents.
/// 2. Call the destructor.
/// 3. Remove the node from the dependency graph (also drops every outgoing edge the module held).
/// 4. Its exported symbols and namespace contributions are released by
///    [`super::RegistryInner::unregister_module`] as part of step 3.
pub(super) fn unload(registry: &ModuleRegistry, context: &Context, module: NodeKey) -> Result<()> {
    let mut inner = registry.inner().write();

    if !inner.unloadable(module) {
        return Err(Error::Permission("unload: module still has dependents".into()));
    }

    let record = inner
        .graph()
        .node_payload(module)
        .ok_or_else(|| Error::NotFound("unload: unknown module".into()))?
        .clone();

    if record
        .unload_lock
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(Error::Permission("unload: module is already being unloaded".into()));
    }

    if let Some(state) = record.state.lock().take() {
        let info = ModuleInfo::new(module, registry.clone());
        record.constructor.destruct(context, &info, state);
    }

    inner.unregister_module(module)?;
    ::tracing::info!(module = %record.name, "module unloaded");
    Ok(())
}

/// Unloads every currently-unloadable module, in reverse topological order, repeating to a fixed
/// point (unloading a leaf can make its own dependency unloadable in turn). Equivalent to, but
/// more efficient than, calling [`unload`] repeatedly until no further progress is made.
pub(super) fn unload_unused(registry: &ModuleRegistry, context: &Context) -> Result<usize> {
    let mut total = 0;
    loop {
        let candidates: Vec<NodeKey> = {
            let inner = registry.inner().read();
            let order = inner.graph().topological_sort(Direction::Outgoing).unwrap_or_default();
            order.into_iter().rev().filter(|&id| inner.unloadable(id)).collect()
        };
        if candidates.is_empty() {
            break;
        }
        let mut progressed = false;
        for id in candidates {
            if unload(registry, context, id).is_ok() {
                total += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    Ok(total)
}
