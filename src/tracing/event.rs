// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot event emission.

use crate::tracing::registry;
use crate::tracing::subscriber::EventMetadata;
use crate::Result;
use std::fmt;

/// Emits an event on the calling thread's bound call stack. A no-op if the thread has no bound
/// call stack (rather than an error) — events are fire-and-forget diagnostics, and a thread that
/// never registered with tracing should not have to guard every call site with a check first.
/// Fails with [`crate::Error::Permission`] if the thread's call stack is registered but suspended.
pub fn emit(metadata: EventMetadata, args: fmt::Arguments<'_>) -> Result<()> {
    match registry::with_current_call_stack(|stack| stack.event_emit(metadata, args)) {
        Some(result) => result,
        None => Ok(()),
    }
}

/// Convenience macro mirroring `tracing::event!`.
#[macro_export]
macro_rules! event {
    ($level:expr, $name:expr, $($arg:tt)*) => {
        $crate::tracing::event::emit(
            $crate::tracing::subscriber::EventMetadata {
                name: $name,
                target: module_path!(),
                level: $level,
            },
            format_args!($($arg)*),
        )
    };
}
