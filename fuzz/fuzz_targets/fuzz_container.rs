#![no_main]

//! Fuzz target for registry operations
//!
//! Applies random sequences of bind/alias/tag/resolve/flush operations over a
//! small identifier space and checks that resolution never panics and that
//! shared bindings keep handing out one object.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use service_container::{ClassDescriptor, Container, ContainerError, Param, Recipe};
use std::sync::Arc;

const IDS: [&str; 6] = ["a", "b", "c", "Leaf", "Node", "Iface"];

#[derive(Debug, Arbitrary)]
struct Id(u8);

impl Id {
    fn name(&self) -> &'static str {
        IDS[self.0 as usize % IDS.len()]
    }
}

/// Operations to perform on the container
#[derive(Debug, Arbitrary)]
enum ContainerOp {
    Bind(Id, Id),
    Singleton(Id, Id),
    Factory(Id, bool),
    Alias(Id, Id),
    Tag(Id),
    Contextual(Id, Id, Id),
    Make(Id),
    Get(Id),
    Tagged,
    Remove(Id),
    ForgetInstances,
    Flush,
}

fn register_classes(container: &Container) {
    container.register_descriptor(ClassDescriptor::new("Leaf").constructor(|_| Ok(0u8)));
    container.register_descriptor(
        ClassDescriptor::new("Node")
            .param(Param::class("child", "Leaf"))
            .param(Param::class("peers", "Node").variadic())
            .constructor(|_| Ok(1u8)),
    );
    container.register_descriptor(ClassDescriptor::interface("Iface").bind_to("Leaf"));
}

fuzz_target!(|ops: Vec<ContainerOp>| {
    let container = Container::new();
    register_classes(&container);

    for op in ops {
        match op {
            ContainerOp::Bind(id, concrete) => {
                let _ = container.bind(id.name(), concrete.name());
            }
            ContainerOp::Singleton(id, concrete) => {
                let _ = container.singleton(id.name(), concrete.name());
            }
            ContainerOp::Factory(id, shared) => {
                let recipe = Recipe::factory(|_, _| Ok(2u8));
                let _ = if shared {
                    container.singleton(id.name(), recipe)
                } else {
                    container.bind(id.name(), recipe)
                };
            }
            ContainerOp::Alias(id, alias) => {
                match container.alias(id.name(), alias.name()) {
                    Ok(()) => assert_eq!(container.get_alias(alias.name()), container.get_alias(id.name())),
                    Err(ContainerError::AliasCycle { .. }) => {}
                    Err(other) => panic!("unexpected alias error: {other}"),
                }
            }
            ContainerOp::Tag(id) => {
                let _ = container.tag([id.name()], "fuzz");
            }
            ContainerOp::Contextual(target, need, give) => {
                let _ = container.when(target.name()).needs(need.name()).give(give.name());
            }
            ContainerOp::Make(id) => {
                if let Ok(first) = container.make(id.name()) {
                    if container.is_shared(id.name()) {
                        let second = container.make(id.name()).unwrap();
                        assert!(Arc::ptr_eq(&first, &second));
                    }
                }
            }
            ContainerOp::Get(id) => {
                if let Err(err) = container.get(id.name()) {
                    if !container.has(id.name()) {
                        assert!(matches!(
                            err,
                            ContainerError::NotFound { .. } | ContainerError::CircularDependency { .. }
                        ));
                    }
                }
            }
            ContainerOp::Tagged => {
                let _ = container.tagged("fuzz");
            }
            ContainerOp::Remove(id) => {
                container.remove(id.name());
                assert!(!container.bound(id.name()));
            }
            ContainerOp::ForgetInstances => container.forget_instances(),
            ContainerOp::Flush => {
                container.flush();
                assert!(container.is_empty());
            }
        }
    }
});
