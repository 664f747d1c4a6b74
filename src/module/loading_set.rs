// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Staged, all-or-nothing construction of a batch of modules.

use crate::errors::{Error, Result};
use crate::graph::{Direction, Graph, NodeKey};
use crate::module::export::{Export, ModuleInspector};
use crate::module::info::ModuleInfo;
use crate::module::record::{DependencyKind, ModuleRecord};
use crate::module::parameter::Parameter;
use crate::module::ModuleRegistry;
use crate::version::Version;
use crate::Context;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

type OnSuccess = Box<dyn FnOnce(&ModuleInfo) + Send>;
type OnError = Box<dyn FnOnce(&Export, &Error) + Send>;

struct PendingModule {
    export: Export,
    callbacks: Vec<(Option<OnSuccess>, Option<OnError>)>,
}

/// A batch of candidate modules, accumulated and then committed atomically.
///
/// Everything added to a set is purely local state until [`LoadingSet::finish`] is called: the
/// registry is not touched until then, so a discarded (`dismiss`ed or dropped) set has no effect
/// on it.
pub struct LoadingSet {
    registry: ModuleRegistry,
    pending: IndexMap<String, PendingModule>,
}

impl LoadingSet {
    /// Creates a new, empty loading set bound to `registry`.
    pub fn new(registry: ModuleRegistry) -> Self {
        Self { registry, pending: IndexMap::new() }
    }

    /// True iff a module named `name` is already pending in this set (not the registry).
    pub fn has_module(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// True iff some pending module declares an export matching the given triple.
    pub fn has_symbol(&self, name: &str, namespace: &str, version: &Version) -> bool {
        self.pending.values().any(|p| {
            p.export
                .exports
                .iter()
                .any(|e| e.name == name && e.namespace == namespace && &e.version == version)
        })
    }

    /// Adds a manifest assembled in memory by `caller`. `caller` is currently unused beyond
    /// attribution in logs — freestanding exports carry their own authorship metadata.
    pub fn append_freestanding_module(&mut self, _caller: Option<NodeKey>, export: Export) -> Result<()> {
        if self.pending.contains_key(&export.name) {
            return Err(Error::AlreadyExists(format!("module {:?} already pending in this set", export.name)));
        }
        self.pending.insert(export.name.clone(), PendingModule { export, callbacks: Vec::new() });
        Ok(())
    }

    /// Enumerates candidates from `inspector`, appending every one `filter` accepts.
    pub fn append_modules(&mut self, inspector: &dyn ModuleInspector, mut filter: impl FnMut(&Export) -> bool) -> Result<()> {
        let mut accepted = Vec::new();
        inspector.inspect(&mut |export: &Export| {
            if filter(export) {
                accepted.push(Export {
                    name: export.name.clone(),
                    description: export.description.clone(),
                    author: export.author.clone(),
                    license: export.license.clone(),
                    root: export.root.clone(),
                    imports: export.imports.clone(),
                    exports: export.exports.clone(),
                    namespaces: export.namespaces.clone(),
                    params: export.params.clone(),
                    resources: export.resources.clone(),
                    constructor: export.constructor.clone(),
                });
            }
            true
        });
        for export in accepted {
            self.append_freestanding_module(None, export)?;
        }
        Ok(())
    }

    /// Attaches success/error callbacks to an already-pending module. Each fires exactly once,
    /// during [`LoadingSet::finish`] (on success or failure) or [`LoadingSet::dismiss`] (error
    /// only, since nothing succeeded).
    pub fn append_callback(
        &mut self,
        module_name: &str,
        on_success: impl FnOnce(&ModuleInfo) + Send + 'static,
        on_error: impl FnOnce(&Export, &Error) + Send + 'static,
    ) -> Result<()> {
        let pending = self
            .pending
            .get_mut(module_name)
            .ok_or_else(|| Error::NotFound(format!("no pending module named {module_name:?}")))?;
        pending.callbacks.push((Some(Box::new(on_success)), Some(Box::new(on_error))));
        Ok(())
    }

    /// Drops the set without committing anything to the registry. Fires every `on_error`
    /// callback, in the order modules were appended.
    pub fn dismiss(mut self) {
        let err = Error::Invalid("loading set dismissed".into());
        for (_, mut pending) in self.pending.drain(..) {
            for (_, on_error) in &mut pending.callbacks {
                if let Some(on_error) = on_error.take() {
                    on_error(&pending.export, &err);
                }
            }
        }
    }

    /// Commits the set: resolves imports, checks for cycles, constructs every module in
    /// dependency order, and either lands them all in the registry or rolls every one of them
    /// back.
    pub fn finish(mut self, context: &Context) -> Result<()> {
        let registry = self.registry.clone();
        let mut inner = registry.inner().write();

        // Step 1-2: build a merged candidate graph (pending modules + every registry module they
        // might depend on) and resolve each pending import to a unique exporter.
        let mut work = Graph::<PendingSlot, DependencyKind>::new();
        let mut pending_ids: IndexMap<String, NodeKey> = IndexMap::new();
        for name in self.pending.keys() {
            let id = work.add_node(PendingSlot::Pending(name.clone()))?;
            pending_ids.insert(name.clone(), id);
        }

        // Duplicate-export check across the pending batch itself.
        let mut seen_exports: IndexSet<(String, String, u64, u64, u64)> = IndexSet::new();
        for pending in self.pending.values() {
            for e in &pending.export.exports {
                let key = (e.name.clone(), e.namespace.clone(), e.version.major, e.version.minor, e.version.patch);
                if !seen_exports.insert(key) {
                    let err = Error::Invalid(format!(
                        "duplicate export {}/{} {} within loading set",
                        e.name, e.namespace, e.version
                    ));
                    drop(inner);
                    self.fail_all(&err);
                    return Err(err);
                }
            }
        }

        let mut registry_refs: IndexMap<NodeKey, NodeKey> = IndexMap::new();
        let mut static_edges: Vec<(NodeKey, NodeKey, DependencyKind)> = Vec::new();

        for (name, pending_id) in &pending_ids {
            let export = &self.pending[name].export;
            for import in &export.imports {
                let resolution = resolve_import(&inner, &self.pending, import);
                let exporter = match resolution {
                    Some(Resolution::Pending(other_name)) => {
                        *pending_ids.get(&other_name).expect("resolved name must be pending")
                    }
                    Some(Resolution::Registry(reg_id)) => {
                        *registry_refs.entry(reg_id).or_insert_with(|| {
                            let record = inner.graph().node_payload(reg_id).cloned();
                            work.add_node(PendingSlot::Existing(reg_id, record)).expect("graph id space")
                        })
                    }
                    None => {
                        let err = Error::Invalid(format!(
                            "module {:?}: no exporter found for {}/{} {}",
                            name, import.name, import.namespace, import.version
                        ));
                        drop(inner);
                        self.fail_all(&err);
                        return Err(err);
                    }
                };
                static_edges.push((*pending_id, exporter, DependencyKind::Static));
            }
        }

        for (src, dst, kind) in &static_edges {
            work.add_edge(*src, *dst, *kind)?;
        }

        // Step 3: acyclicity across the merged graph.
        if work.is_cyclic() {
            let err = Error::Invalid("loading set introduces a dependency cycle".into());
            drop(inner);
            self.fail_all(&err);
            return Err(err);
        }

        // Step 4: topological order, dependency-leaves first. `topological_sort` yields a
        // dependents-before-dependencies order along `Outgoing`, so we reverse it.
        let mut order: Vec<NodeKey> = work.topological_sort(Direction::Outgoing)?;
        order.reverse();
        let pending_order: Vec<String> = order
            .into_iter()
            .filter_map(|id| match work.node_payload(id) {
                Some(PendingSlot::Pending(name)) => Some(name.clone()),
                _ => None,
            })
            .collect();

        // Step 5: construct in order, rolling back on the first failure.
        let mut constructed: Vec<(NodeKey, Arc<ModuleRecord>)> = Vec::new();
        let mut failure: Option<(String, Error)> = None;

        for name in &pending_order {
            let export = &self.pending[name].export;
            let static_deps: Vec<(NodeKey, DependencyKind)> = export
                .imports
                .iter()
                .map(|import| {
                    let resolution = resolve_import(&inner, &self.pending, import).expect("already resolved above");
                    let id = match resolution {
                        Resolution::Pending(other) => {
                            constructed
                                .iter()
                                .find(|(_, r)| r.name == other)
                                .map(|(id, _)| *id)
                                .expect("dependency must already be constructed (topological order)")
                        }
                        Resolution::Registry(id) => id,
                    };
                    (id, DependencyKind::Static)
                })
                .collect();

            let record = build_record(export);
            let provisional_id = match inner.register_module(record.clone(), &static_deps) {
                Ok(id) => id,
                Err(err) => {
                    failure = Some((name.clone(), err));
                    break;
                }
            };
            let info = ModuleInfo::new(provisional_id, registry.clone());
            match export.constructor.construct(context, &info) {
                Ok(state) => {
                    *record.state.lock() = Some(state);
                    constructed.push((provisional_id, record));
                }
                Err(err) => {
                    let _ = inner.unregister_module(provisional_id);
                    failure = Some((name.clone(), err));
                    break;
                }
            }
        }

        if let Some((failed_name, err)) = failure {
            for (id, record) in constructed.into_iter().rev() {
                if let Some(state) = record.state.lock().take() {
                    let info = ModuleInfo::new(id, registry.clone());
                    record.constructor.destruct(context, &info, state);
                }
                let _ = inner.unregister_module(id);
            }
            drop(inner);
            ::tracing::warn!(module = %failed_name, error = %err, "loading set rolled back");
            self.fail_all(&err);
            return Err(err);
        }

        drop(inner);
        ::tracing::info!(modules = constructed.len(), "loading set committed");
        for (id, _) in &constructed {
            let name = self.registry.with_record(*id, |r| r.name.clone()).expect("just constructed");
            if let Some(pending) = self.pending.get_mut(&name) {
                let info = ModuleInfo::new(*id, registry.clone());
                for (on_success, _) in &mut pending.callbacks {
                    if let Some(on_success) = on_success.take() {
                        on_success(&info);
                    }
                }
            }
        }
        self.pending.clear();
        Ok(())
    }

    fn fail_all(&mut self, err: &Error) {
        for (_, pending) in self.pending.iter_mut() {
            for (_, on_error) in &mut pending.callbacks {
                if let Some(on_error) = on_error.take() {
                    on_error(&pending.export, err);
                }
            }
        }
        self.pending.clear();
    }
}

enum PendingSlot {
    Pending(String),
    Existing(NodeKey, Option<Arc<ModuleRecord>>),
}

enum Resolution {
    Pending(String),
    Registry(NodeKey),
}

fn resolve_import(
    inner: &super::RegistryInner,
    pending: &IndexMap<String, PendingModule>,
    import: &crate::module::Import,
) -> Option<Resolution> {
    for (name, p) in pending {
        if p.export
            .exports
            .iter()
            .any(|e| e.name == import.name && e.namespace == import.namespace && e.version.is_compatible_with(&import.version))
        {
            return Some(Resolution::Pending(name.clone()));
        }
    }
    inner
        .symbols
        .get(&(import.name.clone(), import.namespace.clone()))?
        .iter()
        .filter(|(version, _)| version.is_compatible_with(&import.version))
        .max_by(|(a, _), (b, _)| crate::version::cmp_long(a, b))
        .map(|(_, id)| Resolution::Registry(*id))
}

fn build_record(export: &Export) -> Arc<ModuleRecord> {
    let mut params = IndexMap::new();
    for spec in &export.params {
        params.insert(spec.name.clone(), Parameter::new(spec.ty, spec.default, spec.read_access, spec.write_access));
    }
    Arc::new(ModuleRecord {
        name: export.name.clone(),
        description: export.description.clone(),
        author: export.author.clone(),
        license: export.license.clone(),
        root: export.root.clone(),
        resources: export.resources.iter().cloned().collect(),
        params,
        imports: Mutex::new(IndexMap::new()),
        exports: export.exports.iter().map(|e| (e.name.clone(), e.namespace.clone(), e.version)).collect(),
        namespaces_static: export.namespaces.iter().cloned().collect(),
        namespaces_dynamic: Mutex::new(IndexSet::new()),
        constructor: export.constructor.clone(),
        state: Mutex::new(None),
        unload_lock: AtomicBool::new(false),
    })
}
