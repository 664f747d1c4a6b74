// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-thread call stack state machine.

use crate::errors::{Error, Result};
use crate::tracing::frame::Frame;
use crate::tracing::subscriber::{EventMetadata, SpanMetadata, StackToken, Subscriber};
use crate::tracing::Level;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::Arc;

const BOUND: u8 = 0b0001;
const SUSPENDED: u8 = 0b0010;
const BLOCKED: u8 = 0b0100;
const LOCKED: u8 = 0b1000;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    subscriber_stacks: Vec<StackToken>,
    scratch: String,
    capacity: usize,
    level_cap: Level,
    frames: Vec<Frame>,
}

/// A single thread's tracing call stack.
///
/// Mirrors the source's `fimo_internal_tracing_call_stack` as a `BOUND`/`SUSPENDED`/`BLOCKED`/
/// `LOCKED` bit flag word (an `AtomicU8` here, guarding the same four states the source's enum
/// encodes) plus the mutable span/event state behind a `parking_lot::Mutex`. `LOCKED` only ever
/// protects the brief window inside [`CallStack::switch`] and [`CallStack::unblock`] where two
/// threads could otherwise race to bind/unblock the same unbound stack; it is never held across a
/// subscriber callback.
pub struct CallStack {
    state: AtomicU8,
    inner: Mutex<Inner>,
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl fmt::Debug for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallStack")
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl CallStack {
    /// Creates a new, unbound, suspended call stack, asking every subscriber for its private
    /// state. If any subscriber's `create_stack` fails, already-created subscriber state is rolled
    /// back via `drop_stack` in reverse order before the error is returned.
    pub fn new(
        subscribers: &[Arc<dyn Subscriber>],
        max_level: Level,
        buffer_capacity: usize,
    ) -> Result<Arc<Self>> {
        let mut stacks = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            match subscriber.create_stack() {
                Ok(token) => stacks.push(token),
                Err(err) => {
                    for (subscriber, token) in subscribers[..stacks.len()].iter().zip(stacks) {
                        subscriber.drop_stack(token);
                    }
                    return Err(err);
                }
            }
        }
        Ok(Arc::new(Self {
            state: AtomicU8::new(SUSPENDED),
            inner: Mutex::new(Inner {
                subscriber_stacks: stacks,
                scratch: String::with_capacity(buffer_capacity),
                capacity: buffer_capacity,
                level_cap: max_level,
                frames: Vec::new(),
            }),
            subscribers: subscribers.to_vec(),
        }))
    }

    /// Binds a freshly created, still-unshared stack directly, skipping the handshake in
    /// [`CallStack::switch`]. Only valid for a stack nobody else can yet observe (i.e. right after
    /// [`CallStack::new`], before the `Arc` is published anywhere).
    pub(crate) fn bind_fresh(&self) {
        self.state.store(BOUND, Ordering::Release);
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.state.load(Ordering::Acquire) & BOUND != 0
    }

    /// Moves the calling thread's active call stack from `old` to `new`.
    ///
    /// `new` must be unbound, suspended, and not blocked; `old` must be bound. On success `new`
    /// becomes bound and no longer suspended, and `old` becomes unbound (still suspended, as it
    /// was left by whoever is about to park it).
    pub fn switch(new: &Arc<CallStack>, old: &Arc<CallStack>) -> Result<()> {
        loop {
            let cur = new.state.load(Ordering::Acquire);
            if cur & LOCKED != 0 {
                std::hint::spin_loop();
                continue;
            }
            if cur & BOUND != 0 || cur & SUSPENDED == 0 || cur & BLOCKED != 0 {
                return Err(Error::Permission(
                    "switch: target call stack must be unbound, suspended and unblocked".into(),
                ));
            }
            if new
                .state
                .compare_exchange_weak(cur, cur | LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }

        let old_cur = old.state.load(Ordering::Acquire);
        if old_cur & BOUND == 0 {
            new.state.fetch_and(!LOCKED, Ordering::Release);
            return Err(Error::Permission(
                "switch: source call stack is not bound".into(),
            ));
        }
        old.state.fetch_and(!BOUND, Ordering::Release);
        new.state.store(BOUND, Ordering::Release);
        Ok(())
    }

    /// Suspends the calling thread's bound, unsuspended call stack, optionally also marking it
    /// blocked (unable to be `switch`ed back to until `unblock`ed).
    pub fn suspend(&self, block: bool) -> Result<()> {
        let cur = self.state.load(Ordering::Acquire);
        if cur != BOUND {
            return Err(Error::Permission(
                "suspend: call stack must be bound and not already suspended".into(),
            ));
        }
        let next = BOUND | SUSPENDED | if block { BLOCKED } else { 0 };
        self.state
            .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Permission("suspend: call stack state changed concurrently".into()))?;
        let mut inner = self.inner.lock();
        for (subscriber, token) in self.subscribers.iter().zip(inner.subscriber_stacks.iter_mut()) {
            subscriber.suspend(token, block);
        }
        Ok(())
    }

    /// Resumes a bound, suspended-but-not-blocked call stack.
    pub fn resume(&self) -> Result<()> {
        let cur = self.state.load(Ordering::Acquire);
        if cur != (BOUND | SUSPENDED) {
            return Err(Error::Permission(
                "resume: call stack must be bound, suspended and unblocked".into(),
            ));
        }
        self.state
            .compare_exchange(cur, BOUND, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Permission("resume: call stack state changed concurrently".into()))?;
        let mut inner = self.inner.lock();
        for (subscriber, token) in self.subscribers.iter().zip(inner.subscriber_stacks.iter_mut()) {
            subscriber.resume(token);
        }
        Ok(())
    }

    /// Clears the `BLOCKED` bit of an unbound, suspended, blocked call stack, making it eligible
    /// for `switch` again. Callable from any thread, hence the same `LOCKED` handshake `switch`
    /// uses to avoid racing with it over the same stack.
    pub fn unblock(&self) -> Result<()> {
        loop {
            let cur = self.state.load(Ordering::Acquire);
            if cur & LOCKED != 0 {
                std::hint::spin_loop();
                continue;
            }
            if cur & BOUND != 0 || cur & SUSPENDED == 0 || cur & BLOCKED == 0 {
                return Err(Error::Permission(
                    "unblock: call stack must be unbound, suspended and blocked".into(),
                ));
            }
            if self
                .state
                .compare_exchange_weak(cur, cur | LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                let mut inner = self.inner.lock();
                for (subscriber, token) in self.subscribers.iter().zip(inner.subscriber_stacks.iter_mut()) {
                    subscriber.unblock(token);
                }
                self.state.store(SUSPENDED, Ordering::Release);
                return Ok(());
            }
        }
    }

    /// Tears down a call stack: legal only when unbound, not blocked, and with no live spans.
    pub fn destroy(&self) -> Result<()> {
        let cur = self.state.load(Ordering::Acquire);
        if cur & BOUND != 0 || cur & BLOCKED != 0 {
            return Err(Error::Permission(
                "destroy: call stack must be unbound and unblocked".into(),
            ));
        }
        let mut inner = self.inner.lock();
        if !inner.frames.is_empty() {
            return Err(Error::Permission(
                "destroy: call stack still has live spans".into(),
            ));
        }
        let stacks = std::mem::take(&mut inner.subscriber_stacks);
        for (subscriber, token) in self.subscribers.iter().zip(stacks) {
            subscriber.destroy_stack(token);
        }
        Ok(())
    }

    /// Pushes a new span, narrowing the stack's level cap to `min(current cap, metadata.level)`.
    /// Rolled back (via `span_drop` on already-notified subscribers) if any subscriber's
    /// `span_push` fails.
    pub fn span_create(&self, metadata: SpanMetadata, args: fmt::Arguments<'_>) -> Result<u64> {
        let cur = self.state.load(Ordering::Acquire);
        if cur & BOUND == 0 || cur & SUSPENDED != 0 {
            return Err(Error::Permission(
                "span_create: call stack must be bound and not suspended".into(),
            ));
        }

        let mut inner = self.inner.lock();
        if metadata.level > inner.level_cap {
            // Below the current cap: still allocate a frame id (span_destroy is unconditional
            // LIFO), but skip rendering and subscriber notification.
            let id = NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed);
            let saved_cursor = inner.scratch.len();
            let saved_level_cap = inner.level_cap;
            inner.frames.push(Frame { id, metadata, saved_cursor, saved_level_cap });
            return Ok(id);
        }

        let saved_cursor = inner.scratch.len();
        let saved_level_cap = inner.level_cap;
        let message = render(&mut inner.scratch, inner.capacity, args);
        let id = NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed);

        let mut notified = 0;
        let mut failure = None;
        for (subscriber, token) in self.subscribers.iter().zip(inner.subscriber_stacks.iter_mut()) {
            match subscriber.span_push(token, &metadata, &message) {
                Ok(()) => notified += 1,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = failure {
            for (subscriber, token) in self.subscribers[..notified].iter().zip(inner.subscriber_stacks.iter_mut()) {
                subscriber.span_drop(token);
            }
            inner.scratch.truncate(saved_cursor);
            return Err(err);
        }

        inner.level_cap = metadata.level.min(inner.level_cap);
        inner.frames.push(Frame { id, metadata, saved_cursor, saved_level_cap });
        Ok(id)
    }

    /// Pops a span. `id` must be the top frame's id (LIFO discipline); mismatches are a logic
    /// error in the caller (a [`crate::tracing::span::Span`] guard only ever destroys its own id).
    pub fn span_destroy(&self, id: u64) -> Result<()> {
        let cur = self.state.load(Ordering::Acquire);
        if cur & BOUND == 0 || cur & SUSPENDED != 0 {
            return Err(Error::Permission(
                "span_destroy: call stack must be bound and not suspended".into(),
            ));
        }

        let mut inner = self.inner.lock();
        let frame = match inner.frames.last() {
            Some(frame) if frame.id == id => inner.frames.pop().unwrap(),
            Some(_) | None => {
                return Err(Error::Invalid(
                    "span_destroy: id is not the top of the call stack".into(),
                ))
            }
        };
        for (subscriber, token) in self.subscribers.iter().zip(inner.subscriber_stacks.iter_mut()) {
            subscriber.span_pop(token);
        }
        inner.scratch.truncate(frame.saved_cursor);
        inner.level_cap = frame.saved_level_cap;
        Ok(())
    }

    /// Renders and dispatches an event, provided it is at or above the stack's current level cap.
    /// A no-op (not even rendered) in that case. Fails with [`Error::Permission`] if the stack is
    /// suspended or otherwise not the calling thread's active, bound stack.
    pub fn event_emit(&self, metadata: EventMetadata, args: fmt::Arguments<'_>) -> Result<()> {
        let cur = self.state.load(Ordering::Acquire);
        if cur & BOUND == 0 || cur & SUSPENDED != 0 {
            return Err(Error::Permission(
                "event_emit: call stack must be bound and not suspended".into(),
            ));
        }

        let mut inner = self.inner.lock();
        if metadata.level > inner.level_cap {
            return Ok(());
        }
        let cursor = inner.scratch.len();
        let message = render(&mut inner.scratch, inner.capacity, args);
        for (subscriber, token) in self.subscribers.iter().zip(inner.subscriber_stacks.iter_mut()) {
            subscriber.event_emit(token, &metadata, &message);
        }
        inner.scratch.truncate(cursor);
        Ok(())
    }
}

/// Appends `args` to `scratch` starting at its current length, truncated to fit `capacity`, and
/// returns the newly written tail as an owned `String` (the subscriber callbacks below need a
/// borrow that outlives `scratch`'s own mutable borrow, so we hand them a copy of just the part
/// they need rather than fight the borrow checker over a `&str` into `scratch`).
fn render(scratch: &mut String, capacity: usize, args: fmt::Arguments<'_>) -> String {
    let start = scratch.len();
    let remaining = capacity.saturating_sub(start);
    if remaining == 0 {
        return String::new();
    }
    let mut rendered = String::new();
    let _ = fmt::Write::write_fmt(&mut rendered, args);
    let cut = floor_char_boundary(&rendered, remaining);
    scratch.push_str(&rendered[..cut]);
    scratch[start..].to_string()
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracing::subscriber::{EventMetadata, SpanMetadata};
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default)]
    struct CountingSubscriber {
        events: AtomicUsize,
    }

    impl Subscriber for CountingSubscriber {
        fn create_stack(&self) -> Result<StackToken> {
            Ok(Box::new(()))
        }
        fn drop_stack(&self, _stack: StackToken) {}
        fn destroy_stack(&self, _stack: StackToken) {}
        fn suspend(&self, _stack: &mut StackToken, _blocked: bool) {}
        fn resume(&self, _stack: &mut StackToken) {}
        fn unblock(&self, _stack: &mut StackToken) {}
        fn span_push(&self, _stack: &mut StackToken, _metadata: &SpanMetadata, _message: &str) -> Result<()> {
            Ok(())
        }
        fn span_drop(&self, _stack: &mut StackToken) {}
        fn span_pop(&self, _stack: &mut StackToken) {}
        fn event_emit(&self, _stack: &mut StackToken, _metadata: &EventMetadata, _message: &str) {
            self.events.fetch_add(1, Ordering::Relaxed);
        }
        fn flush(&self) {}
        fn destroy(&self) {}
    }

    fn span_meta() -> SpanMetadata {
        SpanMetadata { name: "span", target: "test", level: Level::Info }
    }

    fn event_meta() -> EventMetadata {
        EventMetadata { name: "event", target: "test", level: Level::Info }
    }

    #[test]
    fn fresh_stack_suspend_resume_destroy() {
        let subs: Vec<Arc<dyn Subscriber>> = vec![Arc::new(CountingSubscriber::default())];
        let stack = CallStack::new(&subs, Level::Trace, 256).unwrap();
        stack.bind_fresh();
        assert!(stack.is_bound());
        stack.suspend(false).unwrap();
        stack.resume().unwrap();
        stack.suspend(false).unwrap();
        assert!(!stack.is_bound());
        stack.destroy().unwrap();
    }

    #[test]
    fn destroy_rejects_bound_stack() {
        let subs: Vec<Arc<dyn Subscriber>> = vec![Arc::new(CountingSubscriber::default())];
        let stack = CallStack::new(&subs, Level::Trace, 256).unwrap();
        stack.bind_fresh();
        assert!(stack.destroy().is_err());
    }

    #[test]
    fn span_narrows_level_cap_and_restores_on_pop() {
        let subs: Vec<Arc<dyn Subscriber>> = vec![Arc::new(CountingSubscriber::default())];
        let stack = CallStack::new(&subs, Level::Trace, 256).unwrap();
        stack.bind_fresh();
        let mut meta = span_meta();
        meta.level = Level::Warn;
        let id = stack.span_create(meta, format_args!("span message")).unwrap();
        {
            let inner = stack.inner.lock();
            assert_eq!(inner.level_cap, Level::Warn);
        }
        stack.span_destroy(id).unwrap();
        let inner = stack.inner.lock();
        assert_eq!(inner.level_cap, Level::Trace);
    }

    #[test]
    fn event_below_cap_is_suppressed() {
        let counter = Arc::new(CountingSubscriber::default());
        let subs: Vec<Arc<dyn Subscriber>> = vec![counter.clone()];
        let stack = CallStack::new(&subs, Level::Trace, 256).unwrap();
        stack.bind_fresh();
        let mut meta = span_meta();
        meta.level = Level::Error;
        let id = stack.span_create(meta, format_args!("x")).unwrap();
        stack.event_emit(event_meta(), format_args!("suppressed")).unwrap();
        assert_eq!(counter.events.load(Ordering::Relaxed), 0);
        stack.span_destroy(id).unwrap();
        stack.event_emit(event_meta(), format_args!("visible")).unwrap();
        assert_eq!(counter.events.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn event_emit_rejects_suspended_stack() {
        let subs: Vec<Arc<dyn Subscriber>> = vec![Arc::new(CountingSubscriber::default())];
        let stack = CallStack::new(&subs, Level::Trace, 256).unwrap();
        stack.bind_fresh();
        stack.suspend(false).unwrap();
        assert!(matches!(
            stack.event_emit(event_meta(), format_args!("x")),
            Err(Error::Permission(_))
        ));
    }

    #[test]
    fn span_create_rejects_suspended_stack() {
        let subs: Vec<Arc<dyn Subscriber>> = vec![Arc::new(CountingSubscriber::default())];
        let stack = CallStack::new(&subs, Level::Trace, 256).unwrap();
        stack.bind_fresh();
        stack.suspend(false).unwrap();
        assert!(matches!(
            stack.span_create(span_meta(), format_args!("x")),
            Err(Error::Permission(_))
        ));
    }

    #[test]
    fn span_destroy_enforces_lifo() {
        let subs: Vec<Arc<dyn Subscriber>> = vec![Arc::new(CountingSubscriber::default())];
        let stack = CallStack::new(&subs, Level::Trace, 256).unwrap();
        stack.bind_fresh();
        let outer = stack.span_create(span_meta(), format_args!("outer")).unwrap();
        let inner = stack.span_create(span_meta(), format_args!("inner")).unwrap();
        assert!(stack.span_destroy(outer).is_err());
        stack.span_destroy(inner).unwrap();
        stack.span_destroy(outer).unwrap();
    }

    #[test]
    fn switch_requires_target_unbound_suspended() {
        let subs: Vec<Arc<dyn Subscriber>> = vec![Arc::new(CountingSubscriber::default())];
        let old = CallStack::new(&subs, Level::Trace, 64).unwrap();
        old.bind_fresh();
        let new = CallStack::new(&subs, Level::Trace, 64).unwrap();
        new.bind_fresh();
        assert!(CallStack::switch(&new, &old).is_err());
    }
}
