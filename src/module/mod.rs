// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module registry: the table of loaded modules, their symbols, namespaces and parameters, and
//! the dependency graph that ties them together.

mod export;
mod info;
pub mod loading_set;
mod parameter;
mod pseudo;
mod record;
mod unload;

pub use export::{Export, ExportedSymbol, Import, ModuleConstructor, ModuleInspector, ParamSpec};
pub use info::ModuleInfo;
pub use parameter::{Access, ParamType, ParamValue, Parameter};
pub use pseudo::PseudoModule;

use crate::errors::{Error, Result};
use crate::graph::{Direction, Graph, NodeKey};
use crate::module::record::{DependencyKind, ModuleRecord};
use crate::version::Version;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// A resolved, callable handle to a symbol obtained through [`ModuleRegistry::load_symbol`].
///
/// The source returns a raw function/data pointer plus a vtable cookie; there is no FFI boundary
/// in scope here (see the crate's top-level docs), so a handle naming the exporting module and the
/// resolved triple plays the same role, letting a caller go back to the registry for the concrete
/// typed value.
#[derive(Clone, Debug)]
pub struct SymbolHandle {
    /// The module that owns this symbol.
    pub module: NodeKey,
    /// The symbol's name.
    pub name: String,
    /// The namespace it was exported into.
    pub namespace: String,
    /// The version actually bound (may be newer than the version requested, subject to
    /// compatibility).
    pub version: Version,
}

pub(crate) struct RegistryInner {
    graph: Graph<Arc<ModuleRecord>, DependencyKind>,
    by_name: IndexMap<String, NodeKey>,
    /// `(name, namespace) -> [(version, exporting module), ...]`, one entry per distinct version
    /// exported under that name/namespace pair.
    symbols: IndexMap<(String, String), Vec<(Version, NodeKey)>>,
    /// `namespace -> number of modules currently exporting into it`.
    namespaces: IndexMap<String, usize>,
}

/// The process-wide table of loaded modules.
///
/// Mutating operations (`unload`, dependency/namespace changes, parameter writes, and committing a
/// [`loading_set::LoadingSet`]) take the single `parking_lot::RwLock` in write mode; read-only
/// queries take it in read mode, so independent lookups never block each other.
#[derive(Clone)]
pub struct ModuleRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ModuleRegistry")
            .field("modules", &inner.by_name.len())
            .field("namespaces", &inner.namespaces.len())
            .finish()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                graph: Graph::new(),
                by_name: IndexMap::new(),
                symbols: IndexMap::new(),
                namespaces: IndexMap::new(),
            })),
        }
    }

    pub(crate) fn with_record<R>(&self, id: NodeKey, f: impl FnOnce(&ModuleRecord) -> R) -> Option<R> {
        let inner = self.inner.read();
        inner.graph.node_payload(id).map(|record| f(record))
    }

    /// Looks up a module by its exact name.
    pub fn find_by_name(&self, name: &str) -> Result<ModuleInfo> {
        let inner = self.inner.read();
        let id = *inner
            .by_name
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("no module named {name:?}")))?;
        Ok(ModuleInfo::new(id, self.clone()))
    }

    /// Finds a module exporting `(name, namespace)` with a version compatible with `required`.
    /// When several exporters qualify, the one with the greatest version (long comparison) wins.
    pub fn find_by_symbol(&self, name: &str, namespace: &str, required: &Version) -> Result<ModuleInfo> {
        let inner = self.inner.read();
        let candidates = inner
            .symbols
            .get(&(name.to_string(), namespace.to_string()))
            .ok_or_else(|| Error::NotFound(format!("no symbol {name:?} in namespace {namespace:?}")))?;
        let best = candidates
            .iter()
            .filter(|(version, _)| version.is_compatible_with(required))
            .max_by(|(a, _), (b, _)| crate::version::cmp_long(a, b))
            .ok_or_else(|| Error::NotCompatible { required: *required, got: candidates[0].0 })?;
        Ok(ModuleInfo::new(best.1, self.clone()))
    }

    /// True iff any loaded module currently exports into `namespace`, or `namespace` is empty.
    pub fn namespace_exists(&self, namespace: &str) -> bool {
        if namespace.is_empty() {
            return true;
        }
        self.inner.read().namespaces.contains_key(namespace)
    }

    /// Resolves `(name, namespace, version)` on behalf of `caller`, recording the binding in the
    /// caller's import table. Requires `caller` to already have a dependency edge onto the
    /// exporting module and to have `namespace` included.
    pub fn load_symbol(&self, caller: NodeKey, name: &str, namespace: &str, required: Version) -> Result<SymbolHandle> {
        let mut inner = self.inner.write();
        let candidates = inner
            .symbols
            .get(&(name.to_string(), namespace.to_string()))
            .ok_or_else(|| Error::NotFound(format!("no symbol {name:?} in namespace {namespace:?}")))?
            .clone();
        let (version, exporter) = candidates
            .iter()
            .filter(|(version, _)| version.is_compatible_with(&required))
            .max_by(|(a, _), (b, _)| crate::version::cmp_long(a, b))
            .copied()
            .ok_or_else(|| Error::NotCompatible { required, got: candidates[0].0 })?;

        if !inner.graph.contains_edge(caller, exporter) {
            return Err(Error::Permission(format!(
                "load_symbol: caller has no dependency edge onto the exporter of {name:?}"
            )));
        }
        let included = inner
            .graph
            .node_payload(caller)
            .map(|record| record.namespace_included(namespace))
            .unwrap_or(false);
        if !included {
            return Err(Error::Permission(format!(
                "load_symbol: caller has not included namespace {namespace:?}"
            )));
        }

        let record = inner.graph.node_payload(caller).expect("checked above");
        record
            .imports
            .lock()
            .insert((name.to_string(), namespace.to_string()), (version, exporter));
        ::tracing::trace!(%name, %namespace, %version, "symbol resolved");
        Ok(SymbolHandle { module: exporter, name: name.to_string(), namespace: namespace.to_string(), version })
    }

    /// Dynamically includes `namespace` for `caller`. A no-op (but still `Ok`) if already
    /// included, whether statically or dynamically.
    pub fn namespace_include(&self, caller: NodeKey, namespace: &str) -> Result<()> {
        let inner = self.inner.read();
        let record = inner
            .graph
            .node_payload(caller)
            .ok_or_else(|| Error::NotFound("namespace_include: unknown module".into()))?;
        record.namespaces_dynamic.lock().insert(namespace.to_string());
        Ok(())
    }

    /// Removes `namespace` from `caller`'s dynamic inclusion set. Fails with
    /// [`Error::Permission`] if `namespace` was statically included (static inclusions cannot be
    /// excluded).
    pub fn namespace_exclude(&self, caller: NodeKey, namespace: &str) -> Result<()> {
        let inner = self.inner.read();
        let record = inner
            .graph
            .node_payload(caller)
            .ok_or_else(|| Error::NotFound("namespace_exclude: unknown module".into()))?;
        if record.namespaces_static.contains(namespace) {
            return Err(Error::Permission(format!("namespace {namespace:?} is statically included")));
        }
        record.namespaces_dynamic.lock().shift_remove(namespace);
        Ok(())
    }

    /// Returns `(included, is_static)` for `namespace` as seen by `caller`.
    pub fn namespace_included(&self, caller: NodeKey, namespace: &str) -> Result<(bool, bool)> {
        let inner = self.inner.read();
        let record = inner
            .graph
            .node_payload(caller)
            .ok_or_else(|| Error::NotFound("namespace_included: unknown module".into()))?;
        let is_static = namespace.is_empty() || record.namespaces_static.contains(namespace);
        let included = is_static || record.namespaces_dynamic.lock().contains(namespace);
        Ok((included, is_static))
    }

    /// Adds a dynamic dependency edge `caller -> target`. Fails with [`Error::Invalid`] if it
    /// would introduce a cycle.
    pub fn acquire_dependency(&self, caller: NodeKey, target: NodeKey) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.graph.contains_node(caller) || !inner.graph.contains_node(target) {
            return Err(Error::NotFound("acquire_dependency: unknown module".into()));
        }
        if inner.graph.contains_edge(caller, target) {
            return Ok(());
        }
        if inner.graph.path_exists(target, caller)? {
            return Err(Error::Invalid("acquire_dependency: would introduce a cycle".into()));
        }
        inner.graph.add_edge(caller, target, DependencyKind::Dynamic)?;
        ::tracing::debug!(caller = caller.get(), target = target.get(), "dependency acquired");
        Ok(())
    }

    /// Removes a dynamic dependency edge. Fails with [`Error::Permission`] if the edge is static.
    pub fn relinquish_dependency(&self, caller: NodeKey, target: NodeKey) -> Result<()> {
        let mut inner = self.inner.write();
        let edge = inner
            .graph
            .find_edge(caller, target)
            .ok_or_else(|| Error::NotFound("relinquish_dependency: no such dependency".into()))?;
        match inner.graph.edge_payload(edge) {
            Some(DependencyKind::Static) => {
                return Err(Error::Permission("relinquish_dependency: edge is static".into()))
            }
            Some(DependencyKind::Dynamic) => {}
            None => unreachable!("edge looked up by find_edge must have a payload"),
        }
        inner.graph.remove_edge(edge)?;
        Ok(())
    }

    /// True iff `caller` has any dependency edge (static or dynamic) onto `target`.
    pub fn has_dependency(&self, caller: NodeKey, target: NodeKey) -> bool {
        self.inner.read().graph.contains_edge(caller, target)
    }

    /// Returns `(type, read_access, write_access)` for a module's parameter.
    pub fn param_query(&self, module: NodeKey, param: &str) -> Result<(ParamType, Access, Access)> {
        let inner = self.inner.read();
        let record = inner
            .graph
            .node_payload(module)
            .ok_or_else(|| Error::NotFound("param_query: unknown module".into()))?;
        let p = record
            .params
            .get(param)
            .ok_or_else(|| Error::NotFound(format!("no parameter named {param:?}")))?;
        Ok((p.ty(), p.read_access(), p.write_access()))
    }

    fn with_param<R>(&self, module: NodeKey, param: &str, f: impl FnOnce(&Parameter) -> Result<R>) -> Result<R> {
        let inner = self.inner.read();
        let record = inner
            .graph
            .node_payload(module)
            .ok_or_else(|| Error::NotFound("unknown module".into()))?;
        let p = record
            .params
            .get(param)
            .ok_or_else(|| Error::NotFound(format!("no parameter named {param:?}")))?;
        f(p)
    }

    /// Reads a `public` parameter. Any caller may use this.
    pub fn param_get_public(&self, module: NodeKey, param: &str) -> Result<ParamValue> {
        self.with_param(module, param, |p| {
            if p.read_access() != Access::Public {
                return Err(Error::Permission(format!("parameter {param:?} is not publicly readable")));
            }
            Ok(p.get_inner())
        })
    }

    /// Writes a `public` parameter.
    pub fn param_set_public(&self, module: NodeKey, param: &str, value: ParamValue) -> Result<()> {
        self.with_param(module, param, |p| {
            if p.write_access() != Access::Public {
                return Err(Error::Permission(format!("parameter {param:?} is not publicly writable")));
            }
            p.set_inner(value)
        })
    }

    /// Reads a `dependency`-visibility parameter. `caller` must have a dependency edge onto
    /// `module`.
    pub fn param_get_dependency(&self, caller: NodeKey, module: NodeKey, param: &str) -> Result<ParamValue> {
        if !self.has_dependency(caller, module) {
            return Err(Error::Permission("param_get_dependency: caller has no dependency on module".into()));
        }
        self.with_param(module, param, |p| {
            if p.read_access() == Access::Private {
                return Err(Error::Permission(format!("parameter {param:?} is private")));
            }
            Ok(p.get_inner())
        })
    }

    /// Writes a `dependency`-visibility parameter.
    pub fn param_set_dependency(&self, caller: NodeKey, module: NodeKey, param: &str, value: ParamValue) -> Result<()> {
        if !self.has_dependency(caller, module) {
            return Err(Error::Permission("param_set_dependency: caller has no dependency on module".into()));
        }
        self.with_param(module, param, |p| {
            if p.write_access() == Access::Private {
                return Err(Error::Permission(format!("parameter {param:?} is private")));
            }
            p.set_inner(value)
        })
    }

    /// Reads a `private` parameter. Only the owning module (`caller == module`) may use this.
    pub fn param_get_private(&self, caller: NodeKey, module: NodeKey, param: &str) -> Result<ParamValue> {
        if caller != module {
            return Err(Error::Permission("param_get_private: caller does not own this parameter".into()));
        }
        self.with_param(module, param, |p| Ok(p.get_inner()))
    }

    /// Writes a `private` parameter.
    pub fn param_set_private(&self, caller: NodeKey, module: NodeKey, param: &str, value: ParamValue) -> Result<()> {
        if caller != module {
            return Err(Error::Permission("param_set_private: caller does not own this parameter".into()));
        }
        self.with_param(module, param, |p| p.set_inner(value))
    }

    /// Reads a parameter with no visibility check at all, for a module operating on its own
    /// direct handle.
    pub fn param_get_inner(&self, module: NodeKey, param: &str) -> Result<ParamValue> {
        self.with_param(module, param, |p| Ok(p.get_inner()))
    }

    /// Writes a parameter with no visibility check at all.
    pub fn param_set_inner(&self, module: NodeKey, param: &str, value: ParamValue) -> Result<()> {
        self.with_param(module, param, |p| p.set_inner(value))
    }

    /// Unloads a single module. See [`unload::unload`] for the full protocol.
    pub fn unload(&self, context: &crate::Context, module: NodeKey) -> Result<()> {
        unload::unload(self, context, module)
    }

    /// Unloads every currently-unloadable module, in reverse topological order, repeating until a
    /// fixed point (unloading leaves can make their own dependencies unloadable in turn).
    pub fn unload_unused(&self, context: &crate::Context) -> Result<usize> {
        unload::unload_unused(self, context)
    }

    pub(crate) fn inner(&self) -> &RwLock<RegistryInner> {
        &self.inner
    }

    /// Number of modules currently loaded (including pseudo-modules).
    pub fn module_count(&self) -> usize {
        self.inner.read().by_name.len()
    }
}

impl RegistryInner {
    pub(crate) fn graph(&self) -> &Graph<Arc<ModuleRecord>, DependencyKind> {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut Graph<Arc<ModuleRecord>, DependencyKind> {
        &mut self.graph
    }

    pub(crate) fn by_name(&self) -> &IndexMap<String, NodeKey> {
        &self.by_name
    }

    pub(crate) fn unloadable(&self, module: NodeKey) -> bool {
        self.graph
            .neighbors(module, Direction::Incoming)
            .next()
            .is_none()
    }

    pub(crate) fn register_module(
        &mut self,
        record: Arc<ModuleRecord>,
        dependencies: &[(NodeKey, DependencyKind)],
    ) -> Result<NodeKey> {
        if self.by_name.contains_key(&record.name) {
            return Err(Error::AlreadyExists(format!("module {:?} already loaded", record.name)));
        }
        let name = record.name.clone();
        let exports = record.exports.clone();
        let id = self.graph.add_node(record)?;
        self.by_name.insert(name, id);
        for &(target, kind) in dependencies {
            self.graph.add_edge(id, target, kind)?;
        }
        for (name, namespace, version) in exports {
            self.symbols.entry((name, namespace.clone())).or_default().push((version, id));
            *self.namespaces.entry(namespace).or_insert(0) += 1;
        }
        Ok(id)
    }

    pub(crate) fn unregister_module(&mut self, id: NodeKey) -> Result<Arc<ModuleRecord>> {
        let record = self.graph.remove_node(id)?;
        self.by_name.shift_remove(&record.name);
        for (name, namespace, version) in &record.exports {
            if let Some(versions) = self.symbols.get_mut(&(name.clone(), namespace.clone())) {
                versions.retain(|(v, m)| !(v == version && *m == id));
                if versions.is_empty() {
                    self.symbols.shift_remove(&(name.clone(), namespace.clone()));
                }
            }
            if let Some(count) = self.namespaces.get_mut(namespace) {
                *count -= 1;
                if *count == 0 {
                    self.namespaces.shift_remove(namespace);
                }
            }
        }
        ::tracing::warn!(module = %record.name, "module unregistered");
        Ok(record)
    }
}
