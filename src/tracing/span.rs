// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RAII span guards.

use crate::tracing::registry;
use crate::tracing::subscriber::SpanMetadata;
use crate::Result;
use std::fmt;

/// A live span on the calling thread's call stack.
///
/// Created by [`Span::new`], which pushes the span via the bound call stack's `span_create`;
/// dropping the guard pops it again. Spans nest LIFO: dropping an outer span while an inner one
/// from the same stack is still alive is a caller bug the underlying `span_destroy` call rejects,
/// which would panic here rather than silently reorder the stack — callers are expected to respect
/// ordinary Rust scoping (inner spans end before outer ones) and never leak the guard out of its
/// creating scope.
#[must_use = "a span is closed when dropped; binding it to `_` ends it immediately"]
pub struct Span {
    id: u64,
}

impl Span {
    /// Enters a new span on the calling thread's bound call stack, at the level and metadata
    /// given. Fails if the thread has no bound call stack or any subscriber rejects the span.
    pub fn new(metadata: SpanMetadata, args: fmt::Arguments<'_>) -> Result<Self> {
        let id = registry::with_current_call_stack(|stack| stack.span_create(metadata, args))??;
        Ok(Self { id })
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        let id = self.id;
        let result = registry::with_current_call_stack(|stack| stack.span_destroy(id));
        if !matches!(result, Some(Ok(()))) {
            // The call stack responsible for this span's id no longer exists, or the id was not
            // the top frame. Both indicate a logic error in the caller (leaking a guard across an
            // `unregister_thread`, or destroying spans out of order) rather than a recoverable
            // runtime condition.
            debug_assert!(false, "span dropped out of order or after its call stack was torn down");
        }
    }
}

/// Convenience macro mirroring `tracing::span!`: builds a [`SpanMetadata`] from the call site and
/// enters it.
#[macro_export]
macro_rules! span {
    ($level:expr, $name:expr, $($arg:tt)*) => {{
        $crate::tracing::span::Span::new(
            $crate::tracing::subscriber::SpanMetadata {
                name: $name,
                target: module_path!(),
                level: $level,
            },
            format_args!($($arg)*),
        )
    }};
}
