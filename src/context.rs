// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide root object: owns the module registry and tracing subsystem, and mediates
//! their initialisation and teardown order.

use crate::errors::{Error, Result};
use crate::module::ModuleRegistry;
use crate::tracing::{TracingConfig, TracingSubsystem};
use crate::version::Version;
use static_assertions::assert_impl_all;
use std::fmt;
use std::sync::Arc;

/// This build's own version, compared against a caller's required version by
/// [`Context::check_version`].
pub const BUILTIN_VERSION: Version = Version::new(0, 1, 0, 0);

assert_impl_all!(Context: Send, Sync);

/// A tagged configuration input accepted by [`Context::new`].
///
/// Modeled as an enum rather than a builder so that unrecognised configuration (e.g. a tag from a
/// newer version of this crate passed to an older one) is a data value a `match` can reject with
/// [`Error::Invalid`], rather than a method that simply wouldn't exist — there is no real
/// forward-compatibility surface to preserve here (no FFI, no dynamic loading of this crate
/// itself), but the shape of the source's "list of tagged init structs" is kept because more tags
/// are the expected growth path for this API.
#[derive(Debug)]
#[non_exhaustive]
pub enum ContextOption {
    /// Configuration for the context's [`TracingSubsystem`].
    TracingCreationConfig(TracingConfig),
}

struct ContextInner {
    registry: ModuleRegistry,
    tracing: Option<TracingSubsystem>,
}

impl fmt::Debug for ContextInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextInner").field("registry", &self.registry).finish_non_exhaustive()
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        // Teardown is reverse of init: module subsystem first, then tracing. A context with
        // modules still loaded at this point is a caller bug (every loaded module must be
        // unloaded, typically via `unload_unused`, before the last `Context` handle is dropped).
        let remaining = self.registry.module_count();
        assert_eq!(
            remaining, 0,
            "Context dropped with {remaining} module(s) still loaded; unload them before releasing the last handle"
        );
        if let Some(tracing) = self.tracing.take() {
            if let Err(err) = tracing.destroy() {
                // Same class of programming error as above: a thread left registered past the
                // point where nothing should still be using this context.
                panic!("tracing subsystem teardown failed: {err}");
            }
        }
    }
}

/// A process-wide, reference-counted handle to the module registry and tracing subsystem.
///
/// Cloning a `Context` bumps a strong reference count; there is no weak-handle variant in this
/// core (any caller holding a `Context` is trusted to release it once done, same as the source).
/// The last clone to drop runs [`ContextInner`]'s teardown.
#[derive(Clone, Debug)]
pub struct Context(Arc<ContextInner>);

impl Context {
    /// Creates a new context from a list of tagged configuration options.
    pub fn new(options: Vec<ContextOption>) -> Result<Self> {
        let mut tracing_config = TracingConfig::default();
        for option in options {
            match option {
                ContextOption::TracingCreationConfig(config) => tracing_config = config,
            }
        }
        Ok(Self(Arc::new(ContextInner {
            registry: ModuleRegistry::new(),
            tracing: Some(TracingSubsystem::new(tracing_config)),
        })))
    }

    /// Creates a context with default (no subscribers) tracing configuration.
    pub fn new_default() -> Result<Self> {
        Self::new(Vec::new())
    }

    /// The module registry owned by this context.
    pub fn registry(&self) -> &ModuleRegistry {
        &self.0.registry
    }

    /// The tracing subsystem owned by this context.
    pub fn tracing(&self) -> &TracingSubsystem {
        self.0.tracing.as_ref().expect("tracing subsystem is only taken during teardown")
    }

    /// Compares `required` against this build's [`BUILTIN_VERSION`], per
    /// `Version::is_compatible_with`.
    pub fn check_version(&self, required: &Version) -> Result<()> {
        if BUILTIN_VERSION.is_compatible_with(required) {
            Ok(())
        } else {
            Err(Error::NotCompatible { required: *required, got: BUILTIN_VERSION })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_version_accepts_builtin() {
        let ctx = Context::new_default().unwrap();
        ctx.check_version(&BUILTIN_VERSION).unwrap();
    }

    #[test]
    fn check_version_rejects_incompatible_major() {
        let ctx = Context::new_default().unwrap();
        let required = Version::new(99, 0, 0, 0);
        assert!(ctx.check_version(&required).is_err());
    }

    #[test]
    fn drop_with_no_modules_does_not_panic() {
        let ctx = Context::new_default().unwrap();
        drop(ctx);
    }

    #[test]
    #[should_panic(expected = "still loaded")]
    fn drop_with_loaded_module_panics() {
        let ctx = Context::new_default().unwrap();
        let pseudo = crate::module::PseudoModule::new(ctx.registry(), "host").unwrap();
        std::mem::forget(pseudo);
        drop(ctx);
    }
}
