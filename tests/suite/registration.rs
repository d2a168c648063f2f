//! Class registration, bootstrap, and waiting for classes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use tether_core::{ComponentClass, ComponentManager, RegisterError, SceneGraph, WaitError};

use crate::common::{Fixture, Tally, class, name, settle};

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_register_binds_already_tagged_entities() {
    let fx = Fixture::new();
    let tally = Tally::new();
    let door = fx.spawn();
    let lamp = fx.spawn();
    fx.add_tag(door, "Door");

    fx.manager.register(class("Door", "Door", &tally)).await.unwrap();

    assert!(fx.manager.has_component(door, "Door"));
    assert!(!fx.manager.has_component(lamp, "Door"));
    assert_eq!(tally.constructed(), 1);

    settle().await;
    assert_eq!(tally.starts_finished(), 1);
    assert!(fx.manager.bindings("Door")[0].is_initialized());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_names_are_case_insensitive() {
    let fx = Fixture::new();
    let tally = Tally::new();
    let door = fx.spawn();
    fx.add_tag(door, "Door");

    fx.manager
        .register(class("SlidingDoor", "Door", &tally))
        .await
        .unwrap();

    assert!(fx.manager.has_component(door, "slidingdoor"));
    assert!(fx.manager.has_component(door, "SLIDINGDOOR"));
    assert_eq!(fx.manager.registered_classes()[0].as_str(), "SlidingDoor");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_duplicate_registration_rejected() {
    let fx = Fixture::new();
    let tally = Tally::new();
    let door = fx.spawn();
    fx.add_tag(door, "Door");

    fx.manager.register(class("Door", "Door", &tally)).await.unwrap();
    let err = fx
        .manager
        .register(class("door", "Portal", &tally))
        .await
        .unwrap_err();

    assert!(matches!(err, RegisterError::DuplicateName { name: ref n } if *n == name("Door")));
    assert_eq!(fx.manager.registered_classes().len(), 1);
    // The rejected class never bootstrapped anything.
    assert_eq!(tally.constructed(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_register_requires_constructor() {
    let fx = Fixture::new();
    let err = fx
        .manager
        .register(ComponentClass::new("Door", "Door"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegisterError::MissingConstructor { .. }));
    assert!(fx.manager.registered_classes().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_register_rejects_blank_name_and_tag() {
    let fx = Fixture::new();
    let tally = Tally::new();

    let err = fx.manager.register(class("  ", "Door", &tally)).await.unwrap_err();
    assert!(matches!(err, RegisterError::InvalidName(_)));

    let err = fx.manager.register(class("Door", "", &tally)).await.unwrap_err();
    assert!(matches!(err, RegisterError::InvalidTag { .. }));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_bootstrap_construction_failure_surfaces() {
    let fx = Fixture::new();
    let door = fx.spawn();
    fx.add_tag(door, "Door");

    let class = ComponentClass::new("Door", "Door")
        .with_constructor(|entity| Err(anyhow::anyhow!("cannot build {entity}")));
    let err = fx.manager.register(class).await.unwrap_err();

    assert!(matches!(err, RegisterError::Bootstrap { .. }));
    assert!(!fx.manager.has_component(door, "Door"));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_replayed_tags_do_not_double_bind() {
    let fx = Fixture::new();
    let tally = Tally::new();
    fx.scene.set_replay_on_subscribe(true);
    let a = fx.spawn();
    let b = fx.spawn();
    fx.add_tag(a, "Door");
    fx.add_tag(b, "Door");

    fx.manager.register(class("Door", "Door", &tally)).await.unwrap();
    settle().await;

    assert_eq!(tally.constructed(), 2);
    assert_eq!(tally.starts_begun(), 2);
    assert_eq!(fx.manager.bindings("Door").len(), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_registered_classes_are_sorted() {
    let fx = Fixture::new();
    let tally = Tally::new();
    for class_name in ["lamp", "Door", "Bell"] {
        fx.manager
            .register(class(class_name, class_name, &tally))
            .await
            .unwrap();
    }
    let names: Vec<String> = fx
        .manager
        .registered_classes()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(names, ["Bell", "Door", "lamp"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_wait_for_class_resolves_on_registration() {
    let fx = Fixture::new();
    let tally = Tally::new();
    let manager = fx.manager.clone();
    let registrar = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        manager.register(class("Door", "Door", &tally)).await
    });

    let started = Instant::now();
    fx.manager.wait_for_class("door").await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_secs(1));
    registrar.await.unwrap().unwrap();
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_wait_for_class_fails_at_timeout() {
    let fx = Fixture::new();
    fx.manager.set_timeout(Duration::from_secs(2));

    let started = Instant::now();
    let err = fx.manager.wait_for_class("Missing").await.unwrap_err();

    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert!(matches!(
        err,
        WaitError::ClassTimeout { ref name, timeout } if name == "Missing" && timeout == Duration::from_secs(2)
    ));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_independent_managers_share_nothing() {
    let fx = Fixture::new();
    let other = ComponentManager::new(Arc::clone(&fx.scene) as Arc<dyn SceneGraph>);
    let tally = Tally::new();
    let door = fx.spawn();
    fx.add_tag(door, "Door");

    fx.manager.register(class("Door", "Door", &tally)).await.unwrap();

    assert!(fx.manager.has_component(door, "Door"));
    assert!(!other.has_component(door, "Door"));
    assert!(other.registered_classes().is_empty());
}
