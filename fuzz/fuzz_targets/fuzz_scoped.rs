#![no_main]

//! Fuzz target for units of work
//!
//! Interleaves scope boundaries with scoped, singleton and transient
//! resolutions and checks the sharing guarantees of each lifetime.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use service_container::{Container, Instance, Recipe};
use std::sync::Arc;

/// Operations for scoped resolution
#[derive(Debug, Arbitrary)]
enum ScopedOp {
    MakeScoped,
    MakeSingleton,
    MakeTransient,
    EndScope,
    NestedScope(u8),
    ForgetInstances,
}

struct Expected {
    scoped: Option<Instance>,
    singleton: Option<Instance>,
}

fn check(container: &Container, op: &ScopedOp, expected: &mut Expected) {
    match op {
        ScopedOp::MakeScoped => {
            let instance = container.make("request").unwrap();
            if let Some(previous) = &expected.scoped {
                assert!(Arc::ptr_eq(previous, &instance));
            }
            expected.scoped = Some(instance);
        }
        ScopedOp::MakeSingleton => {
            let instance = container.make("config").unwrap();
            if let Some(previous) = &expected.singleton {
                assert!(Arc::ptr_eq(previous, &instance));
            }
            expected.singleton = Some(instance);
        }
        ScopedOp::MakeTransient => {
            let a = container.make("clock").unwrap();
            let b = container.make("clock").unwrap();
            assert!(!Arc::ptr_eq(&a, &b));
        }
        ScopedOp::EndScope => {
            let forgotten = container.forget_scoped_instances();
            assert_eq!(forgotten, usize::from(expected.scoped.is_some()));
            expected.scoped = None;
        }
        ScopedOp::NestedScope(depth) => {
            let guard = container.begin_scope();
            for _ in 0..(*depth % 4) {
                guard.make("request").unwrap();
            }
            drop(guard);
            expected.scoped = None;
        }
        ScopedOp::ForgetInstances => {
            container.forget_instances();
            expected.scoped = None;
            expected.singleton = None;
        }
    }
}

fuzz_target!(|ops: Vec<ScopedOp>| {
    let container = Container::new();
    container.scoped("request", Recipe::factory(|_, _| Ok(0u32))).unwrap();
    container.singleton("config", Recipe::factory(|_, _| Ok(1u32))).unwrap();
    container.bind("clock", Recipe::factory(|_, _| Ok(2u32))).unwrap();

    let mut expected = Expected {
        scoped: None,
        singleton: None,
    };

    for op in ops.iter().take(100) {
        check(&container, op, &mut expected);
    }
});
