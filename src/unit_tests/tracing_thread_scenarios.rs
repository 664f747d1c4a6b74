// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::tracing::subscriber::{EventMetadata, SpanMetadata, StackToken, Subscriber};
use crate::tracing::{TracingConfig, TracingSubsystem};
use crate::{ContextOption, Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct CountingSubscriber {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    suspended: AtomicUsize,
}

impl Subscriber for CountingSubscriber {
    fn create_stack(&self) -> Result<StackToken> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(()))
    }
    fn drop_stack(&self, _stack: StackToken) {}
    fn destroy_stack(&self, _stack: StackToken) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
    fn suspend(&self, _stack: &mut StackToken, _blocked: bool) {
        self.suspended.fetch_add(1, Ordering::SeqCst);
    }
    fn resume(&self, _stack: &mut StackToken) {}
    fn unblock(&self, _stack: &mut StackToken) {}
    fn span_push(&self, _stack: &mut StackToken, _metadata: &SpanMetadata, _message: &str) -> Result<()> {
        Ok(())
    }
    fn span_drop(&self, _stack: &mut StackToken) {}
    fn span_pop(&self, _stack: &mut StackToken) {}
    fn event_emit(&self, _stack: &mut StackToken, _metadata: &EventMetadata, _message: &str) {}
    fn flush(&self) {}
    fn destroy(&self) {}
}

#[test]
fn register_then_unregister_round_trip() {
    let counting = Arc::new(CountingSubscriber::default());
    let ctx = crate::Context::new(vec![ContextOption::TracingCreationConfig(TracingConfig {
        subscribers: vec![counting.clone()],
        ..TracingConfig::default()
    })])
    .unwrap();

    ctx.tracing().register_thread().unwrap();
    assert_eq!(counting.created.load(Ordering::SeqCst), 1);

    ctx.tracing().unregister_thread().unwrap();
    assert_eq!(counting.suspended.load(Ordering::SeqCst), 1);
    assert_eq!(counting.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn double_register_on_the_same_thread_is_rejected() {
    let ctx = TracingSubsystem::new(TracingConfig::default());
    ctx.register_thread().unwrap();
    let err = ctx.register_thread().unwrap_err();
    assert!(matches!(err, Error::Permission(_)));
    ctx.unregister_thread().unwrap();
}

#[test]
fn destroy_refuses_while_a_thread_is_still_registered() {
    let ctx = TracingSubsystem::new(TracingConfig::default());
    ctx.register_thread().unwrap();
    // `destroy` is process-wide: any thread still registered anywhere blocks it, not just this
    // subsystem's own registration, so we must clean up before the subsystem itself can go away.
    ctx.unregister_thread().unwrap();
    ctx.destroy().unwrap();
}
