//! Example demonstrating the #[derive(Buildable)] macro
//!
//! Run with:
//!   cargo run --example derive --features derive

use service_container::{Buildable, Container, Recipe};
use std::sync::Arc;

// Dependencies
#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct Cache {
    size: usize,
}

#[allow(dead_code)]
struct Logger {
    level: String,
}

// Class with injected dependencies
#[derive(Buildable)]
#[buildable(singleton)]
struct UserService {
    #[inject]
    db: Arc<Database>,
    #[inject]
    cache: Arc<Cache>,
    #[inject(optional)]
    logger: Option<Arc<Logger>>,
    #[param(default = 20)]
    page_size: usize,
    // Non-injected field uses Default
    request_count: u64,
}

impl UserService {
    fn describe(&self) -> String {
        let logger_status = if self.logger.is_some() {
            "with logging"
        } else {
            "without logging"
        };
        format!(
            "UserService connected to {} with cache size {} ({}, page size {}, requests: {})",
            self.db.url, self.cache.size, logger_status, self.page_size, self.request_count
        )
    }
}

// Nested injection example
#[derive(Buildable)]
struct ApiController {
    #[inject]
    user_service: Arc<UserService>,
    #[param]
    prefix: String,
}

fn main() -> service_container::Result<()> {
    println!("=== Service Container Derive Macro Demo ===\n");

    // Create container, register classes and bindings
    let container = Container::new();
    container.register_class::<UserService>();
    container.register_class::<ApiController>();
    container.singleton(
        "Database",
        Recipe::factory(|_, _| {
            Ok(Database {
                url: "postgres://localhost:5432/myapp".into(),
            })
        }),
    )?;
    container.singleton("Cache", Recipe::factory(|_, _| Ok(Cache { size: 1024 })))?;
    // Note: Logger is NOT registered, so it will be None

    println!("Building UserService...");
    let user_service = container.make_as::<UserService>("UserService")?;
    println!("  {}", user_service.describe());
    println!();

    // The controller receives the shared UserService and a contextual prefix
    container.when("ApiController").needs("$prefix").give("/api/v1")?;
    let controller = container.make_as::<ApiController>("ApiController")?;
    println!(
        "ApiController mounted at {} (same UserService: {})",
        controller.prefix,
        Arc::ptr_eq(&controller.user_service, &user_service)
    );
    println!();

    println!("=== Demo Complete ===");
    println!("\nThe #[derive(Buildable)] macro generated a class descriptor that:");
    println!("  - Declares #[inject] fields as class dependencies");
    println!("  - Declares #[param] fields as primitives resolved from context");
    println!("  - Uses Default::default() for fields without attributes");
    Ok(())
}
