use service_container::{ClassDescriptor, Container, ContainerError, Param, Parameters, Recipe, Value};
use std::sync::Arc;

struct A;
struct B;

#[derive(Clone, Debug, PartialEq)]
struct Plugin(&'static str);

struct Host {
    plugins: Vec<Arc<Plugin>>,
}

struct Mailer {
    host: String,
    retries: u32,
    fallback: Option<Arc<Plugin>>,
}

fn host_descriptor() -> ClassDescriptor {
    ClassDescriptor::new("Host")
        .param(Param::class("plugins", "Plugin").variadic())
        .constructor(|args| Ok(Host { plugins: args.list::<Plugin>("plugins")? }))
}

fn mailer_descriptor() -> ClassDescriptor {
    ClassDescriptor::new("Mailer")
        .param(Param::primitive("host"))
        .param(Param::primitive("retries").with_default(3u32))
        .param(Param::class("fallback", "FallbackPlugin").nullable())
        .constructor(|args| {
            Ok(Mailer {
                host: args.value::<String>("host")?,
                retries: args.value::<u32>("retries")?,
                fallback: args.optional::<Plugin>("fallback")?,
            })
        })
}

#[test]
fn test_class_cycle() {
    let container = Container::new();
    container.register_descriptor(
        ClassDescriptor::new("A")
            .param(Param::class("b", "B"))
            .constructor(|_| Ok(A)),
    );
    container.register_descriptor(
        ClassDescriptor::new("B")
            .param(Param::class("a", "A"))
            .constructor(|_| Ok(B)),
    );

    match container.make("A") {
        Err(err @ ContainerError::CircularDependency { .. }) => {
            assert!(err.is_binding_resolution());
            assert_eq!(err.build_stack(), ["A", "B", "A"]);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected a cycle"),
    }

    // get() passes cycles through instead of reporting "not found"
    assert!(matches!(
        container.get("A"),
        Err(ContainerError::CircularDependency { .. })
    ));
}

#[test]
fn test_unknown_dependency_names_the_build_stack() {
    let container = Container::new();
    container.register_descriptor(
        ClassDescriptor::new("App")
            .param(Param::class("cache", "Cache"))
            .constructor(|_| Ok(A)),
    );

    let err = container.make("App").err().unwrap();
    assert_eq!(
        err.to_string(),
        "Target class [Cache] does not exist while building [App]"
    );
}

#[test]
fn test_interface_without_binding_is_not_instantiable() {
    let container = Container::new();
    container.register_descriptor(ClassDescriptor::interface("Logger"));
    container.register_descriptor(
        ClassDescriptor::new("App")
            .param(Param::class("logger", "Logger"))
            .constructor(|_| Ok(A)),
    );

    let top = container.make("Logger").err().unwrap();
    assert_eq!(top.to_string(), "Target [Logger] is not instantiable.");

    let nested = container.make("App").err().unwrap();
    assert!(nested.is_binding_resolution());
    assert_eq!(
        nested.to_string(),
        "Target [Logger] is not instantiable while building [App]."
    );
}

#[test]
fn test_interface_bind_metadata() {
    struct FileLogger;

    let container = Container::new();
    container.register_descriptor(ClassDescriptor::interface("Logger").bind_to("FileLogger"));
    container.register_descriptor(ClassDescriptor::new("FileLogger").constructor(|_| Ok(FileLogger)));

    assert!(!container.bound("Logger"));
    assert!(container.make_as::<FileLogger>("Logger").is_ok());
    assert!(container.bound("Logger"));
    assert!(!container.is_shared("Logger"));
}

#[test]
fn test_variadic_class_degrades_to_empty_list() {
    let container = Container::new();
    container.register_descriptor(host_descriptor());

    let host = container.make_as::<Host>("Host").unwrap();
    assert!(host.plugins.is_empty());
}

#[test]
fn test_variadic_class_single_binding() {
    let container = Container::new();
    container.register_descriptor(host_descriptor());
    container
        .bind("Plugin", Recipe::factory(|_, _| Ok(Plugin("only"))))
        .unwrap();

    let host = container.make_as::<Host>("Host").unwrap();
    assert_eq!(host.plugins.len(), 1);
    assert_eq!(*host.plugins[0], Plugin("only"));
}

#[test]
fn test_variadic_cycle_is_not_swallowed() {
    let container = Container::new();
    container.register_descriptor(
        ClassDescriptor::new("Node")
            .param(Param::class("children", "Node").variadic())
            .constructor(|_| Ok(A)),
    );

    assert!(matches!(
        container.make("Node"),
        Err(ContainerError::CircularDependency { .. })
    ));
}

#[test]
fn test_primitive_defaults_and_nullable_class() {
    let container = Container::new();
    container.register_descriptor(mailer_descriptor());
    container.when("Mailer").needs("$host").give("smtp.local").unwrap();

    let mailer = container.make_as::<Mailer>("Mailer").unwrap();
    assert_eq!(mailer.host, "smtp.local");
    assert_eq!(mailer.retries, 3);
    assert!(mailer.fallback.is_none());

    container
        .bind("FallbackPlugin", Recipe::factory(|_, _| Ok(Plugin("fallback"))))
        .unwrap();
    let mailer = container.make_as::<Mailer>("Mailer").unwrap();
    assert_eq!(mailer.fallback.as_deref(), Some(&Plugin("fallback")));
}

#[test]
fn test_overrides_win_and_stay_local() {
    struct App {
        mailer: Arc<Mailer>,
    }

    let container = Container::new();
    container.register_descriptor(mailer_descriptor());
    container.register_descriptor(
        ClassDescriptor::new("App")
            .param(Param::class("mailer", "Mailer"))
            .constructor(|args| Ok(App { mailer: args.get::<Mailer>("mailer")? })),
    );
    container.when("Mailer").needs("$host").give("smtp.local").unwrap();

    let mailer = container
        .make_as_with::<Mailer>(
            "Mailer",
            Parameters::new().with("host", "override".to_string()).with("retries", 9u32),
        )
        .unwrap();
    assert_eq!(mailer.host, "override");
    assert_eq!(mailer.retries, 9);

    // Overrides given for App do not reach the Mailer it depends on
    let app = container
        .make_as_with::<App>("App", Parameters::new().with("retries", 9u32))
        .unwrap();
    assert_eq!(app.mailer.retries, 3);
}

#[test]
fn test_class_param_default_when_unbound() {
    #[derive(Clone)]
    struct Clock(&'static str);

    struct Scheduler {
        clock: Arc<Clock>,
    }

    let container = Container::new();
    container.register_descriptor(
        ClassDescriptor::new("Scheduler")
            .param(Param::class("clock", "Clock").with_default_value(Value::of(Clock("default"))))
            .constructor(|args| Ok(Scheduler { clock: args.get::<Clock>("clock")? })),
    );

    let scheduler = container.make_as::<Scheduler>("Scheduler").unwrap();
    assert_eq!(scheduler.clock.0, "default");

    container.bind("Clock", Recipe::factory(|_, _| Ok(Clock("bound")))).unwrap();
    let scheduler = container.make_as::<Scheduler>("Scheduler").unwrap();
    assert_eq!(scheduler.clock.0, "bound");
}

#[test]
fn test_class_without_constructor_params() {
    let container = Container::new();
    container.register_descriptor(ClassDescriptor::new("Plain").constructor(|args| {
        assert!(args.is_empty());
        Ok(A)
    }));

    assert!(container.make_as::<A>("Plain").is_ok());
}
