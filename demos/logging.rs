//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use service_container::{ClassDescriptor, Container, Param, Parameters, Recipe};
use std::sync::Arc;

// Example services
#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    db: Arc<Database>,
    table: String,
}

#[allow(dead_code)]
struct RequestContext {
    request_id: String,
}

fn main() {
    // JSON with logging-json, pretty output otherwise
    #[cfg(feature = "logging")]
    {
        use service_container::logging::{LoggingConfig, Verbosity};

        LoggingConfig::new()
            .verbosity(Verbosity::Resolutions)
            .container_only()
            .install();
    }

    println!("=== Service Container Logging Demo ===\n");

    // Create container (logs: "Creating service container")
    let container = Container::new();

    // Register bindings (logs: "Registering binding")
    container
        .singleton(
            "db",
            Recipe::factory(|_, _| {
                Ok(Database {
                    url: "postgres://localhost/mydb".into(),
                })
            }),
        )
        .unwrap();
    container.alias("db", "database").unwrap();

    // Register a class (logs: "Registering class descriptor")
    container.register_descriptor(
        ClassDescriptor::new("UserService")
            .param(Param::class("db", "database"))
            .param(Param::primitive("table"))
            .constructor(|args| {
                Ok(UserService {
                    db: args.get::<Database>("db")?,
                    table: args.value::<String>("table")?,
                })
            }),
    );

    // Contextual primitive (logs: "Registering contextual binding")
    container.when("UserService").needs("$table").give("users").unwrap();

    // Resolve (logs: "Resolving", "Building class", "Cached shared instance")
    let _users = container.make("UserService").unwrap();

    // Overrides build a fresh object without touching the cache
    let _custom = container
        .make_with("UserService", Parameters::new().with("table", "admins".to_string()))
        .unwrap();

    // Unknown identifier (logs: "Resolving" then the error is returned)
    let missing = container.get("mailer");
    assert!(missing.is_err());

    // Unit of work (logs: "Beginning unit of work", "Ending unit of work")
    container
        .scoped(
            "request",
            Recipe::factory(|_, _| {
                Ok(RequestContext {
                    request_id: "req-12345".into(),
                })
            }),
        )
        .unwrap();
    container.in_scope(|scope| {
        let _ctx = scope.make("request").unwrap();
    });

    // Lock the container (logs: "Container locked")
    container.lock();
    assert!(container.bind("late", "Late").is_err());

    println!("\n=== Demo Complete ===");
    println!("Check the log output above to see structured logging in action!");
    println!("\nTip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");
}
