//! Concurrent resolution tests
//!
//! Build state is per call tree, so threads resolving different targets
//! must never observe each other's contextual bindings, and a scope ending
//! mid-build must not leak the in-flight object into the next scope.

use service_container::{ClassDescriptor, Container, Param, Recipe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

// ===== Test Services =====

struct Disk(&'static str);

struct Uploader {
    disk: Arc<Disk>,
}

struct Exporter {
    disk: Arc<Disk>,
}

fn disk_container() -> Container {
    let container = Container::new();
    container.bind("disk", Recipe::factory(|_, _| Ok(Disk("local")))).unwrap();
    container.bind("s3", Recipe::factory(|_, _| Ok(Disk("s3")))).unwrap();
    container.register_descriptor(
        ClassDescriptor::new("Uploader")
            .param(Param::class("disk", "disk"))
            .constructor(|args| Ok(Uploader { disk: args.get::<Disk>("disk")? })),
    );
    container.register_descriptor(
        ClassDescriptor::new("Exporter")
            .param(Param::class("disk", "disk"))
            .constructor(|args| Ok(Exporter { disk: args.get::<Disk>("disk")? })),
    );
    container.when("Exporter").needs("disk").give("s3").unwrap();
    container
}

// ===== Tests =====

#[test]
fn test_contextual_bindings_do_not_leak_between_threads() {
    let container = disk_container();
    let start = Arc::new(Barrier::new(8));

    thread::scope(|scope| {
        for n in 0..8 {
            let container = container.clone();
            let start = Arc::clone(&start);
            scope.spawn(move || {
                start.wait();
                for _ in 0..200 {
                    if n % 2 == 0 {
                        let uploader = container.make_as::<Uploader>("Uploader").unwrap();
                        assert_eq!(uploader.disk.0, "local");
                    } else {
                        let exporter = container.make_as::<Exporter>("Exporter").unwrap();
                        assert_eq!(exporter.disk.0, "s3");
                    }
                }
            });
        }
    });
}

#[test]
fn test_scope_end_during_build_is_not_cached() {
    let builds = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));

    let container = Container::new();
    {
        let builds = Arc::clone(&builds);
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        container
            .scoped(
                "request",
                Recipe::factory(move |_, _| {
                    // Only the first build parks until the scope has ended
                    if builds.fetch_add(1, Ordering::SeqCst) == 0 {
                        started.wait();
                        release.wait();
                    }
                    Ok(Disk("request"))
                }),
            )
            .unwrap();
    }

    let in_flight = {
        let container = container.clone();
        thread::spawn(move || container.make("request").unwrap())
    };

    started.wait();
    assert_eq!(container.forget_scoped_instances(), 0);
    release.wait();

    let stale = in_flight.join().unwrap();
    let fresh = container.make("request").unwrap();

    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert!(!Arc::ptr_eq(&stale, &fresh));
    assert!(Arc::ptr_eq(&fresh, &container.make("request").unwrap()));
}

#[test]
fn test_concurrent_scoped_builds_share_one_instance() {
    let builds = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    {
        let builds = Arc::clone(&builds);
        container
            .scoped(
                "request",
                Recipe::factory(move |_, _| {
                    builds.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(10));
                    Ok(Disk("request"))
                }),
            )
            .unwrap();
    }

    let scope = container.begin_scope();
    thread::scope(|s| {
        for _ in 0..4 {
            let container = scope.container().clone();
            s.spawn(move || container.make("request").unwrap());
        }
    });
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(scope.end(), 1);

    container.make("request").unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}
