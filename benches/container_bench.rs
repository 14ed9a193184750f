//! Benchmarks for the service container

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use service_container::{ClassDescriptor, Container, Param, Parameters, Recipe};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct SmallService {
    value: i32,
}

#[allow(dead_code)]
struct Repository {
    db: Arc<SmallService>,
    table: String,
}

#[allow(dead_code)]
struct Controller {
    repository: Arc<Repository>,
    page_size: usize,
}

/// A three-level class graph: Controller -> Repository -> db
fn graph_container() -> Container {
    let container = Container::new();
    container
        .singleton("db", Recipe::factory(|_, _| Ok(SmallService { value: 42 })))
        .unwrap();
    container.register_descriptor(
        ClassDescriptor::new("Repository")
            .param(Param::class("db", "db"))
            .param(Param::primitive("table"))
            .constructor(|args| {
                Ok(Repository {
                    db: args.get::<SmallService>("db")?,
                    table: args.value::<String>("table")?,
                })
            }),
    );
    container.register_descriptor(
        ClassDescriptor::new("Controller")
            .param(Param::class("repository", "Repository"))
            .param(Param::primitive("page_size").with_default(25usize))
            .constructor(|args| {
                Ok(Controller {
                    repository: args.get::<Repository>("repository")?,
                    page_size: args.value::<usize>("page_size")?,
                })
            }),
    );
    container.when("Repository").needs("$table").give("users").unwrap();
    container
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("singleton", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .singleton("small", Recipe::factory(|_, _| Ok(SmallService { value: 42 })))
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("bind_concrete", |b| {
        b.iter(|| {
            let container = Container::new();
            container.bind("Logger", "FileLogger").unwrap();
            black_box(container)
        })
    });

    group.bench_function("contextual", |b| {
        b.iter(|| {
            let container = Container::new();
            container.when("Repository").needs("$table").give("users").unwrap();
            black_box(container)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let container = graph_container();
    container.alias("db", "database").unwrap();

    // Warm up the singleton
    let _ = container.make("db").unwrap();

    group.bench_function("make_singleton", |b| {
        b.iter(|| black_box(container.make("db").unwrap()))
    });

    group.bench_function("make_through_alias", |b| {
        b.iter(|| black_box(container.make("database").unwrap()))
    });

    group.bench_function("bound_check", |b| {
        b.iter(|| black_box(container.bound("db")))
    });

    group.bench_function("get_not_found", |b| {
        b.iter(|| black_box(container.get("missing").is_err()))
    });

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.throughput(Throughput::Elements(1));

    let container = graph_container();
    container
        .bind("clock", Recipe::factory(|_, _| Ok(SmallService { value: 0 })))
        .unwrap();

    group.bench_function("transient_factory", |b| {
        b.iter(|| black_box(container.make("clock").unwrap()))
    });

    group.bench_function("class_graph_3_levels", |b| {
        b.iter(|| black_box(container.make("Controller").unwrap()))
    });

    group.bench_function("class_with_overrides", |b| {
        b.iter(|| {
            let overrides = Parameters::new().with("page_size", 100usize);
            black_box(container.make_with("Controller", overrides).unwrap())
        })
    });

    group.finish();
}

fn bench_scoped(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped");

    let container = Container::new();
    container
        .scoped("request", Recipe::factory(|_, _| Ok(SmallService { value: 1 })))
        .unwrap();

    group.bench_function("begin_resolve_end", |b| {
        b.iter(|| {
            let scope = container.begin_scope();
            black_box(scope.make("request").unwrap());
            black_box(scope.end())
        })
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let container = graph_container();
        let _ = container.make("db").unwrap();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.make("db").unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.bench_function("concurrent_builds_4", |b| {
        let container = graph_container();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || {
                        for _ in 0..25 {
                            let _ = c.make("Controller").unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_build,
    bench_scoped,
    bench_concurrent,
);

criterion_main!(benches);
