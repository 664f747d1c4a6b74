// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module manifests and the external collaborators that produce and consume them.

use crate::module::info::ModuleInfo;
use crate::module::parameter::{Access, ParamType, ParamValue};
use crate::version::Version;
use crate::{Context, Result};
use camino::Utf8PathBuf;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A symbol a module requires at construction time.
#[derive(Clone, Debug)]
pub struct Import {
    /// The symbol's name.
    pub name: String,
    /// The namespace it is exported into.
    pub namespace: String,
    /// The minimum version the importer requires (see `Version::is_compatible_with`).
    pub version: Version,
}

/// A symbol a module will own once loaded.
#[derive(Clone, Debug)]
pub struct ExportedSymbol {
    /// The symbol's name.
    pub name: String,
    /// The namespace it is exported into.
    pub namespace: String,
    /// The version under which it is exported.
    pub version: Version,
}

/// A parameter declaration in a manifest.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    /// The parameter's name, unique within the owning module.
    pub name: String,
    /// The parameter's declared type.
    pub ty: ParamType,
    /// Its initial value. Must match `ty`.
    pub default: ParamValue,
    /// Required visibility to read it.
    pub read_access: Access,
    /// Required visibility to write it.
    pub write_access: Access,
}

/// The construct/destruct pair a manifest declares for its module.
///
/// `construct` runs once, with the loading set still open, and returns the module's private
/// state; `destruct` runs once, during unload, consuming that same state back.
pub trait ModuleConstructor: Send + Sync + fmt::Debug {
    /// Builds the module's private state.
    fn construct(&self, context: &Context, info: &ModuleInfo) -> Result<Box<dyn Any + Send + Sync>>;

    /// Tears the module's private state down.
    fn destruct(&self, context: &Context, info: &ModuleInfo, state: Box<dyn Any + Send + Sync>);
}

/// A module manifest: everything a [`crate::module::loading_set::LoadingSet`] needs to build one
/// module, whether hand-assembled in memory (`set_append_freestanding_module`) or produced by a
/// [`ModuleInspector`] (`set_append_modules`).
#[derive(Debug)]
pub struct Export {
    /// Unique, non-empty module name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Author string.
    pub author: Option<String>,
    /// License string.
    pub license: Option<String>,
    /// Filesystem root this module was discovered under, if any.
    pub root: Option<Utf8PathBuf>,
    /// Symbols required at construction time.
    pub imports: Vec<Import>,
    /// Symbols this module will own once loaded.
    pub exports: Vec<ExportedSymbol>,
    /// Namespaces statically included by this module.
    pub namespaces: Vec<String>,
    /// Parameter declarations.
    pub params: Vec<ParamSpec>,
    /// Named resource paths, relative to `root`.
    pub resources: Vec<(String, Utf8PathBuf)>,
    /// The construct/destruct pair.
    pub constructor: Arc<dyn ModuleConstructor>,
}

/// Enumerates candidate [`Export`]s discoverable in the current binary image.
///
/// The source scans a linker section for manifest records placed there by a build-time macro;
/// here discovery is a pluggable trait object registered ahead of time, giving the same
/// deterministic enumeration order for a given process image without unsafe section scanning.
pub trait ModuleInspector: Send + Sync {
    /// Calls `visit` once per candidate export this inspector knows about, in a fixed order.
    /// `visit` returns `true` to keep enumerating, `false` to stop early.
    fn inspect(&self, visit: &mut dyn FnMut(&Export) -> bool);
}
