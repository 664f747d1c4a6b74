// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured, per-call-stack tracing: spans, events and pluggable subscribers.
//!
//! This is a standalone subsystem modeled on the shape of the `tracing`/`tracing-core` crates
//! (spans, subscribers, per-thread call stacks, level filtering) but with its own wire format and
//! state machine, per the data model this crate implements; `fimo_std` itself also uses the
//! ambient `tracing` crate for its own internal diagnostics (see the crate root), which is a
//! separate, unrelated use of a similarly-named concept.

pub mod call_stack;
mod event;
mod frame;
pub mod registry;
pub mod span;
pub mod subscriber;

mod level;

pub use call_stack::CallStack;
pub use event::emit as emit_event;
pub use level::Level;
pub use span::Span;
pub use subscriber::{EventMetadata, SpanMetadata, StackToken, Subscriber};

use crate::errors::{Error, Result};
use std::sync::Arc;

/// Default size, in bytes, of a call stack's message-rendering scratch buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Configuration for a [`TracingSubsystem`], supplied through
/// `ContextOption::TracingCreationConfig` when a [`crate::context::Context`] is created.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Subscribers to install, in the order their callbacks should be invoked.
    pub subscribers: Vec<Arc<dyn Subscriber>>,
    /// The process-wide level cap; spans and events above this level are never even rendered.
    pub max_level: Level,
    /// Scratch buffer size for each call stack's span/event message rendering.
    pub buffer_capacity: usize,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            max_level: Level::Info,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Owns the tracing configuration for one [`crate::context::Context`] and the registration
/// protocol threads use to get a call stack bound.
#[derive(Debug)]
pub struct TracingSubsystem {
    config: TracingConfig,
}

impl TracingSubsystem {
    /// Creates a new subsystem from a resolved configuration. Does not touch any thread-local
    /// state; threads opt in individually via [`TracingSubsystem::register_thread`].
    pub fn new(config: TracingConfig) -> Self {
        Self { config }
    }

    /// Registers the calling thread, creating and binding a fresh call stack built from this
    /// subsystem's subscribers. Fails if the thread is already registered (with this or any other
    /// subsystem) or if any subscriber's `create_stack` fails.
    pub fn register_thread(&self) -> Result<()> {
        if registry::is_registered() {
            return Err(Error::Permission(
                "register_thread: this thread is already registered".into(),
            ));
        }
        let stack = CallStack::new(&self.config.subscribers, self.config.max_level, self.config.buffer_capacity)?;
        stack.bind_fresh();
        registry::bind(stack)
    }

    /// Unregisters the calling thread: suspends its call stack, then destroys it (failing if it
    /// still has live spans, mirroring [`CallStack::destroy`]).
    pub fn unregister_thread(&self) -> Result<()> {
        let stack = registry::unbind()?;
        stack.suspend(false)?;
        stack.destroy()
    }

    /// Flushes every installed subscriber.
    pub fn flush(&self) {
        for subscriber in &self.config.subscribers {
            subscriber.flush();
        }
    }

    /// Tears down every installed subscriber. Refuses while any thread is still registered (with
    /// any subsystem in the process — registration is tracked process-wide, matching the
    /// source's single global tracing backend).
    pub fn destroy(self) -> Result<()> {
        if registry::registered_thread_count() > 0 {
            return Err(Error::Permission(
                "tracing subsystem destroy: threads are still registered".into(),
            ));
        }
        for subscriber in &self.config.subscribers {
            subscriber.destroy();
        }
        Ok(())
    }

    /// The configured level cap.
    pub fn max_level(&self) -> Level {
        self.config.max_level
    }

    /// True iff the configured level cap is not [`Level::Off`] and at least one subscriber is
    /// installed. Spans and events can still be suppressed per-call by their own level, but this is
    /// the cheap process-wide check for whether tracing is worth doing at all.
    pub fn is_enabled(&self) -> bool {
        self.config.max_level != Level::Off && !self.config.subscribers.is_empty()
    }
}
