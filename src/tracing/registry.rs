// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread-local binding of the current call stack.
//!
//! `span!`/`event!` never take a call stack argument; they reach here to find the one bound to
//! the calling thread. This is the Rust-safe analogue of the source's thread-local pointer to the
//! active `fimo_internal_tracing_call_stack`.

use crate::errors::{Error, Result};
use crate::tracing::call_stack::CallStack;
use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of threads currently registered with any tracing subsystem, process-wide. Consulted by
/// [`crate::tracing::TracingSubsystem::destroy`] to refuse teardown while a thread might still
/// call into it.
static REGISTERED_THREADS: AtomicUsize = AtomicUsize::new(0);

struct Binding(Arc<CallStack>);

impl Binding {
    /// Extracts the inner `Arc` without running `Drop` (used by [`unbind`], which hands real
    /// ownership of the cleanup sequence back to its caller instead of the fallback below).
    fn into_inner(self) -> Arc<CallStack> {
        let this = std::mem::ManuallyDrop::new(self);
        unsafe { std::ptr::read(&this.0) }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        // Best-effort cleanup for a thread that exits without calling `unregister_thread`: suspend
        // the stack so it is no longer bound, then destroy it if it has no live spans. A thread
        // that leaked a `Span` guard across its own exit leaves a stack we cannot legally destroy;
        // we still drop our reference and let whoever else holds the `Arc` (if anyone) observe it.
        if self.0.is_bound() {
            let _ = self.0.suspend(false);
        }
        let _ = self.0.destroy();
        REGISTERED_THREADS.fetch_sub(1, Ordering::Release);
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Binding>> = const { RefCell::new(None) };
}

/// Returns the number of threads currently registered, process-wide.
pub fn registered_thread_count() -> usize {
    REGISTERED_THREADS.load(Ordering::Acquire)
}

/// Binds `stack` (already created and `bind_fresh`'d by the caller) as the calling thread's active
/// call stack. Fails if the thread already has one bound.
pub(crate) fn bind(stack: Arc<CallStack>) -> Result<()> {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        if current.is_some() {
            return Err(Error::Permission(
                "register_thread: this thread is already registered".into(),
            ));
        }
        *current = Some(Binding(stack));
        REGISTERED_THREADS.fetch_add(1, Ordering::AcqRel);
        Ok(())
    })
}

/// Unbinds and returns the calling thread's active call stack, if any. The caller is responsible
/// for suspending and destroying it; `Binding`'s `Drop` only runs this fallback when `unbind` is
/// never called at all.
pub(crate) fn unbind() -> Result<Arc<CallStack>> {
    CURRENT.with(|current| {
        let taken = current.borrow_mut().take();
        match taken {
            Some(binding) => {
                REGISTERED_THREADS.fetch_sub(1, Ordering::Release);
                Ok(binding.into_inner())
            }
            None => Err(Error::NotFound(
                "unregister_thread: this thread is not registered".into(),
            )),
        }
    })
}

/// Runs `f` with a reference to the calling thread's bound call stack, if it has one.
pub fn with_current_call_stack<R>(f: impl FnOnce(&CallStack) -> R) -> Option<R> {
    CURRENT.with(|current| current.borrow().as_ref().map(|binding| f(&binding.0)))
}

/// True iff the calling thread currently has a call stack bound.
pub fn is_registered() -> bool {
    CURRENT.with(|current| current.borrow().is_some())
}
