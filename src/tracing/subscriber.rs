// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscriber trait: the installable sink for tracing notifications.

use crate::tracing::Level;
use crate::Result;
use std::any::Any;
use std::fmt;

/// Static description of a span, analogous to `tracing::Metadata` for a span.
#[derive(Clone, Copy, Debug)]
pub struct SpanMetadata {
    /// Short, human-readable name (e.g. the enclosing function).
    pub name: &'static str,
    /// The module or subsystem that created the span.
    pub target: &'static str,
    /// Severity of this span.
    pub level: Level,
}

/// Static description of an event.
#[derive(Clone, Copy, Debug)]
pub struct EventMetadata {
    /// Short, human-readable name.
    pub name: &'static str,
    /// The module or subsystem that emitted the event.
    pub target: &'static str,
    /// Severity of this event.
    pub level: Level,
}

/// Opaque per-subscriber, per-call-stack state.
///
/// A subscriber's `create_stack` returns one of these; every later call that concerns that
/// particular call stack hands the same box back via `StackToken::downcast_mut`.
pub type StackToken = Box<dyn Any + Send>;

/// An installable sink for structured tracing notifications.
///
/// This is the Rust rendition of the source's `{create_stack, drop_stack, destroy_stack, suspend,
/// resume, unblock, span_push, span_drop, span_pop, event_emit, flush, destroy}` vtable: a trait
/// object plays the role of the opaque-handle-plus-vtable pair, and `StackToken` plays the role of
/// the per-subscriber opaque stack handle.
///
/// Implementations must not call back into the tracing API (e.g. `event_emit` on the context that
/// is calling them) from within any of these methods on the same thread — reentrancy here is
/// undefined, exactly as for the source.
pub trait Subscriber: Send + Sync + fmt::Debug {
    /// Allocates this subscriber's private state for a newly created call stack.
    fn create_stack(&self) -> Result<StackToken>;

    /// Undoes a `create_stack` whose sibling subscriber's `create_stack` failed (rollback path,
    /// symmetric with `span_push`/`span_drop`).
    fn drop_stack(&self, stack: StackToken);

    /// Called when a fully initialized call stack is torn down through `CallStack::destroy`.
    fn destroy_stack(&self, stack: StackToken);

    /// Notifies the subscriber that its call stack was suspended, optionally also blocked.
    fn suspend(&self, stack: &mut StackToken, blocked: bool);

    /// Notifies the subscriber that its call stack resumed from a (non-blocked) suspension.
    fn resume(&self, stack: &mut StackToken);

    /// Notifies the subscriber that its call stack's BLOCKED bit was cleared.
    fn unblock(&self, stack: &mut StackToken);

    /// A span was pushed. Returning `Err` aborts span creation; the caller unwinds already
    /// notified subscribers via `span_drop` before propagating the error.
    fn span_push(&self, stack: &mut StackToken, metadata: &SpanMetadata, message: &str) -> Result<()>;

    /// Undoes a `span_push` during the unwind described above.
    fn span_drop(&self, stack: &mut StackToken);

    /// A span was popped (normal `span_destroy`, not a rollback).
    fn span_pop(&self, stack: &mut StackToken);

    /// An event was emitted. Best-effort: subscriber errors here are not unwound.
    fn event_emit(&self, stack: &mut StackToken, metadata: &EventMetadata, message: &str);

    /// Flushes any buffered output.
    fn flush(&self);

    /// Final teardown, called once when the owning context is destroyed.
    fn destroy(&self);
}
