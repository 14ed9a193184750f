#![cfg(feature = "derive")]

use service_container::{Buildable, Container, Lifecycle, Recipe};
use std::sync::Arc;

struct Database;

#[derive(Debug)]
struct Cache;

struct Listener(&'static str);

#[derive(Buildable)]
#[buildable(singleton, implements = "Repository")]
struct UserRepository {
    #[inject]
    db: Arc<Database>,
    #[inject(optional)]
    cache: Option<Arc<Cache>>,
    #[inject(variadic, id = "listener")]
    listeners: Vec<Arc<Listener>>,
    #[param(default = 50)]
    page_size: usize,
    #[param]
    table: String,
    #[param(optional)]
    schema: Option<String>,
    hits: u64,
}

#[derive(Buildable)]
#[buildable(name = "health")]
struct HealthCheck {}

#[test]
fn test_derived_descriptor_shape() {
    let descriptor = UserRepository::descriptor();
    assert_eq!(descriptor.name(), "UserRepository");
    assert!(descriptor.is_a("Repository"));
    assert_eq!(descriptor.declared_lifecycle(), Some(Lifecycle::Singleton));

    let params = descriptor.params().unwrap();
    let names: Vec<_> = params.iter().map(|p| p.name()).collect();
    assert_eq!(names, ["db", "cache", "listeners", "page_size", "table", "schema"]);
    assert_eq!(params[0].class_id(), Some("Database"));
    assert!(params[1].is_nullable());
    assert_eq!(params[2].class_id(), Some("listener"));
    assert!(params[2].is_variadic());

    assert_eq!(HealthCheck::descriptor().name(), "health");
    assert_eq!(HealthCheck::descriptor().params().map(|p| p.len()), Some(0));
}

#[test]
fn test_derived_class_resolves() {
    let container = Container::new();
    container.register_class::<UserRepository>();
    container.bind("Database", Recipe::factory(|_, _| Ok(Database))).unwrap();
    container.bind("listener", Recipe::factory(|_, _| Ok(Listener("audit")))).unwrap();
    container.when("UserRepository").needs("$table").give("users").unwrap();

    let repo = container.make_as::<UserRepository>("UserRepository").unwrap();
    assert!(repo.cache.is_none());
    assert_eq!(repo.listeners.len(), 1);
    assert_eq!(repo.listeners[0].0, "audit");
    assert_eq!(repo.page_size, 50);
    assert_eq!(repo.table, "users");
    assert!(repo.schema.is_none());
    assert_eq!(repo.hits, 0);
    let _ = &repo.db;

    // Declared singleton
    let again = container.make_as::<UserRepository>("UserRepository").unwrap();
    assert!(Arc::ptr_eq(&repo, &again));
}
