mod common;

use std::collections::BTreeSet;

use futures::future::join_all;
use seedbed_core::{CollectionDefinition, Error as CoreError, Query, RelationSpec};
use seedbed_engine::{EngineError, SeedSource};

use common::{engine, order_items, orders, users};

#[tokio::test]
async fn concurrent_first_access_seeds_exactly_once() {
    let engine = engine();
    let users = engine.register(users(7)).expect("register users");

    let calls = (0..16).map(|_| {
        let users = users.clone();
        async move { users.list(&Query::new()).await }
    });
    for result in join_all(calls).await {
        assert_eq!(result.expect("list users").pagination.total, 7);
    }
    users.initialize().await.expect("initialize again");

    assert_eq!(users.all().await.expect("all users").len(), 7);
    let report = users.seed_report().expect("seed report");
    assert_eq!(report.source, SeedSource::Synthesized);
    assert_eq!(report.rows, 7);
}

#[tokio::test]
async fn spawned_tasks_share_one_initialization() {
    let engine = engine();
    let users = engine.register(users(5)).expect("register users");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let users = users.clone();
        handles.push(tokio::spawn(async move { users.count(None).await }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("join").expect("count"), 5);
    }
}

#[tokio::test]
async fn every_parent_is_referenced_by_children() {
    let engine = engine();
    engine.register(users(3)).expect("register users");
    let orders = engine.register(orders(30)).expect("register orders");

    let orders = orders.all().await.expect("orders");
    assert_eq!(orders.len(), 30);

    let users = engine.collection("users").expect("users").all().await.expect("users");
    let user_ids: BTreeSet<String> = users
        .iter()
        .filter_map(|user| user.id().and_then(|id| id.as_str()).map(str::to_string))
        .collect();
    let referenced: BTreeSet<String> = orders
        .iter()
        .filter_map(|order| order.value("userId").as_str().map(str::to_string))
        .collect();
    assert_eq!(user_ids.len(), 3);
    assert_eq!(referenced, user_ids);
}

#[tokio::test]
async fn grandchildren_seed_after_the_whole_chain() {
    let engine = engine();
    // Registered child first; order must come from relations, not registration.
    let items = engine.register(order_items(12)).expect("register items");
    engine.register(orders(6)).expect("register orders");
    engine.register(users(2)).expect("register users");

    assert_eq!(
        engine.seed_order().expect("seed order"),
        vec!["users", "orders", "order_items"]
    );

    let items = items.all().await.expect("items");
    let order_ids: BTreeSet<String> = engine
        .collection("orders")
        .expect("orders")
        .all()
        .await
        .expect("orders")
        .iter()
        .filter_map(|order| order.id().and_then(|id| id.as_str()).map(str::to_string))
        .collect();
    assert!(items.iter().all(|item| {
        item.value("orderId")
            .as_str()
            .is_some_and(|id| order_ids.contains(id))
    }));
}

#[tokio::test]
async fn empty_parent_does_not_fail_child_seeding() {
    let engine = engine();
    let users = engine.register(users(0)).expect("register users");
    let orders = engine.register(orders(5)).expect("register orders");

    assert_eq!(orders.all().await.expect("orders").len(), 5);
    assert!(users.all().await.expect("users").is_empty());

    let report = orders.seed_report().expect("report");
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].code, "empty_parent");
    assert_eq!(report.issues[0].relation, "user");
}

#[tokio::test]
async fn unregistered_parent_is_reported() {
    let engine = engine();
    let orders = engine.register(orders(4)).expect("register orders");

    assert_eq!(orders.all().await.expect("orders").len(), 4);
    let report = orders.seed_report().expect("report");
    assert!(report.issues.iter().any(|issue| issue.code == "missing_parent"));
}

#[tokio::test]
async fn cyclic_dependency_is_a_configuration_error() {
    let engine = engine();
    let a = engine
        .register(
            CollectionDefinition::new("a")
                .with_relation("b", RelationSpec::belongs_to("b", "bId"))
                .with_seed_count(2),
        )
        .expect("register a");
    engine
        .register(
            CollectionDefinition::new("b")
                .with_relation("a", RelationSpec::belongs_to("a", "aId"))
                .with_seed_count(2),
        )
        .expect("register b");

    let err = a.list(&Query::new()).await.expect_err("cycle must fail");
    assert!(err.is_configuration());
    match err {
        EngineError::Core(CoreError::CyclicDependency { collection, .. }) => {
            assert!(collection == "a" || collection == "b");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!a.is_initialized());
    assert!(engine.seed_order().is_err());
}

#[tokio::test]
async fn reset_reseeds_on_next_access() {
    let engine = engine();
    let users = engine.register(users(4)).expect("register users");

    let before = users.all().await.expect("users");
    users.clear().await.expect("clear");
    assert!(users.all().await.expect("users").is_empty());

    users.reset();
    assert!(!users.is_initialized());
    let after = users.all().await.expect("users");
    assert_eq!(after.len(), 4);
    assert_ne!(before[0].id(), after[0].id());
}

#[tokio::test]
async fn default_seed_count_applies() {
    let engine = engine();
    let tags = engine
        .register(CollectionDefinition::new("tags"))
        .expect("register tags");
    let expected = engine.options().default_seed_count;
    assert_eq!(tags.count(None).await.expect("count"), expected);
}
