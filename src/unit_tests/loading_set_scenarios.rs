// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::module::loading_set::LoadingSet;
use crate::module::{Export, ExportedSymbol, Import, ModuleConstructor, ModuleInfo};
use crate::version::Version;
use crate::{Context, Error, Result};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct NoopConstructor;

impl ModuleConstructor for NoopConstructor {
    fn construct(&self, _context: &Context, _info: &ModuleInfo) -> Result<Box<dyn Any + Send + Sync>> {
        Ok(Box::new(()))
    }
    fn destruct(&self, _context: &Context, _info: &ModuleInfo, _state: Box<dyn Any + Send + Sync>) {}
}

#[derive(Debug)]
struct CountingConstructor {
    live: Arc<AtomicUsize>,
}

impl ModuleConstructor for CountingConstructor {
    fn construct(&self, _context: &Context, _info: &ModuleInfo) -> Result<Box<dyn Any + Send + Sync>> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(()))
    }
    fn destruct(&self, _context: &Context, _info: &ModuleInfo, _state: Box<dyn Any + Send + Sync>) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

fn bare_export(name: &str, constructor: Arc<dyn ModuleConstructor>) -> Export {
    Export {
        name: name.to_string(),
        description: None,
        author: None,
        license: None,
        root: None,
        imports: Vec::new(),
        exports: Vec::new(),
        namespaces: Vec::new(),
        params: Vec::new(),
        resources: Vec::new(),
        constructor,
    }
}

#[test]
fn duplicate_export_within_set_fails_and_leaves_registry_empty() {
    let ctx = Context::new_default().unwrap();
    let mut set = LoadingSet::new(ctx.registry().clone());

    let mut m1 = bare_export("m1", Arc::new(NoopConstructor));
    m1.exports.push(ExportedSymbol { name: "sym".into(), namespace: "".into(), version: Version::new(1, 0, 0, 0) });
    let mut m2 = bare_export("m2", Arc::new(NoopConstructor));
    m2.exports.push(ExportedSymbol { name: "sym".into(), namespace: "".into(), version: Version::new(1, 0, 0, 0) });

    set.append_freestanding_module(None, m1).unwrap();
    set.append_freestanding_module(None, m2).unwrap();

    let err = set.finish(&ctx).unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
    assert_eq!(ctx.registry().module_count(), 0);
}

#[test]
fn dependent_module_resolves_symbol_and_both_unload_cleanly() {
    let ctx = Context::new_default().unwrap();
    let live = Arc::new(AtomicUsize::new(0));

    let mut producer = bare_export("producer", Arc::new(CountingConstructor { live: live.clone() }));
    producer.exports.push(ExportedSymbol { name: "sym".into(), namespace: "".into(), version: Version::new(1, 0, 0, 0) });

    let mut consumer = bare_export("consumer", Arc::new(CountingConstructor { live: live.clone() }));
    consumer.imports.push(Import { name: "sym".into(), namespace: "".into(), version: Version::new(1, 0, 0, 0) });

    let mut set = LoadingSet::new(ctx.registry().clone());
    set.append_freestanding_module(None, producer).unwrap();
    set.append_freestanding_module(None, consumer).unwrap();
    set.finish(&ctx).unwrap();

    assert_eq!(live.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.registry().module_count(), 2);

    let consumer_info = ctx.registry().find_by_name("consumer").unwrap();
    let producer_info = ctx.registry().find_by_name("producer").unwrap();
    assert!(ctx.registry().has_dependency(consumer_info.id(), producer_info.id()));

    // The producer has a dependent and cannot be unloaded directly...
    assert!(ctx.registry().unload(&ctx, producer_info.id()).is_err());

    // ...but unload_unused tears both down, leaves first.
    let unloaded = ctx.registry().unload_unused(&ctx).unwrap();
    assert_eq!(unloaded, 2);
    assert_eq!(live.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.registry().module_count(), 0);
}

#[test]
fn import_cycle_across_pending_set_fails_and_leaves_registry_empty() {
    let ctx = Context::new_default().unwrap();

    let mut a = bare_export("a", Arc::new(NoopConstructor));
    a.exports.push(ExportedSymbol { name: "a-sym".into(), namespace: "".into(), version: Version::new(1, 0, 0, 0) });
    a.imports.push(Import { name: "b-sym".into(), namespace: "".into(), version: Version::new(1, 0, 0, 0) });

    let mut b = bare_export("b", Arc::new(NoopConstructor));
    b.exports.push(ExportedSymbol { name: "b-sym".into(), namespace: "".into(), version: Version::new(1, 0, 0, 0) });
    b.imports.push(Import { name: "a-sym".into(), namespace: "".into(), version: Version::new(1, 0, 0, 0) });

    let mut set = LoadingSet::new(ctx.registry().clone());
    set.append_freestanding_module(None, a).unwrap();
    set.append_freestanding_module(None, b).unwrap();

    let err = set.finish(&ctx).unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
    assert_eq!(ctx.registry().module_count(), 0);
}

#[test]
fn dismissed_set_fires_on_error_and_touches_nothing() {
    let ctx = Context::new_default().unwrap();
    let mut set = LoadingSet::new(ctx.registry().clone());
    let fired = Arc::new(AtomicUsize::new(0));

    set.append_freestanding_module(None, bare_export("m1", Arc::new(NoopConstructor))).unwrap();
    let fired_clone = fired.clone();
    set.append_callback(
        "m1",
        |_info| panic!("on_success must not fire for a dismissed set"),
        move |_export, _err| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        },
    )
    .unwrap();

    set.dismiss();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.registry().module_count(), 0);
}
