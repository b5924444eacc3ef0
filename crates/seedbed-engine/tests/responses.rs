mod common;

use seedbed_core::{CollectionDefinition, FieldDescriptor, Query, RelationKind, ResponseShape};
use seedbed_engine::{Related, RelationResolutionError};
use serde_json::{Value, json};

use common::{engine, order_items, orders, profiles, record, users};

const NO_INCLUDES: &[&str] = &[];

#[tokio::test]
async fn belongs_to_and_has_many_joins() {
    let engine = engine();
    let users = engine.register(users(3)).expect("users");
    let orders = engine.register(orders(12)).expect("orders");

    let page = orders.list(&Query::new().limit(12)).await.expect("orders");
    let joined = orders.include(page.data, &["user"]).await;
    for order in &joined {
        let user = order.value("user");
        assert_eq!(user["id"], *order.value("userId"));
    }

    let all_users = users.all().await.expect("users");
    let joined = users.include(all_users, &["orders"]).await;
    let total: usize = joined
        .iter()
        .map(|user| {
            let owned = user.value("orders").as_array().expect("orders array");
            assert!(owned.iter().all(|order| order["userId"] == *user.id().expect("id")));
            owned.len()
        })
        .sum();
    assert_eq!(total, 12);

    // Joins are copies; stored users are untouched.
    assert!(
        users
            .all()
            .await
            .expect("users")
            .iter()
            .all(|user| !user.contains("orders"))
    );
}

#[tokio::test]
async fn nested_paths_and_broken_relations() {
    let engine = engine();
    engine.register(users(2)).expect("users");
    engine.register(orders(4)).expect("orders");
    let items = engine.register(order_items(6)).expect("items");

    let all_items = items.all().await.expect("items");
    let joined = items
        .include(all_items, &["order.user", "order.items", "warehouse"])
        .await;
    for item in &joined {
        let order = item.value("order");
        assert_eq!(order["id"], *item.value("orderId"));
        assert_eq!(order["user"]["id"], order["userId"]);
        assert!(order["items"].as_array().is_some_and(|list| !list.is_empty()));
        assert_eq!(item.value("warehouse"), &Value::Null);
    }
}

#[tokio::test]
async fn has_one_and_missing_target() {
    let engine = engine();
    let users = engine.register(users(2)).expect("users");
    let profiles = engine.register(profiles(2)).expect("profiles");

    let all_profiles = profiles.all().await.expect("profiles");
    let all_users = users.include(users.all().await.expect("users"), &["profile"]).await;
    for user in &all_users {
        let profile = user.value("profile");
        assert!(profile.is_null() || profile["userId"] == *user.id().expect("id"));
    }
    let linked = all_users
        .iter()
        .filter(|user| !user.value("profile").is_null())
        .count();
    assert!(linked >= 1);
    assert!(linked <= all_profiles.len());

    let accessors = users.relation_accessors().await.expect("accessors");
    assert_eq!(accessors.len(), 1, "orders target is not registered");
    assert_eq!(accessors["profile"].spec().kind, RelationKind::HasOne);

    let user = &all_users[0];
    let err = users.related(user, "orders").await.expect_err("missing target");
    assert_eq!(
        err,
        RelationResolutionError::MissingTarget {
            collection: "users".to_string(),
            relation: "orders".to_string(),
            target: "orders".to_string(),
        }
    );
    let err = users.related(user, "wishlist").await.expect_err("missing relation");
    assert!(matches!(err, RelationResolutionError::MissingRelation { .. }));
}

#[tokio::test]
async fn related_initializes_the_target() {
    let engine = engine();
    let users = engine.register(users(2)).expect("users");
    let orders = engine.register(orders(3)).expect("orders");

    let user = users.all().await.expect("users")[0].clone();
    assert!(!orders.is_initialized());
    let owned = users.related(&user, "orders").await.expect("orders");
    assert!(orders.is_initialized());
    assert!(owned.is_array());
}

#[tokio::test]
async fn aggregates_cover_every_page() {
    let engine = engine();
    let products = engine
        .register(
            CollectionDefinition::new("products")
                .with_field("price", FieldDescriptor::primitive("integer"))
                .with_seed_count(0),
        )
        .expect("products");
    for price in [100, 200, 150, 300, 250] {
        products
            .create(record(json!({"price": price, "tag": "x"})))
            .await
            .expect("create");
    }

    let shape = ResponseShape::parse(&json!({
        "items": {"$type": "data"},
        "meta": {
            "page": {"$type": "meta", "kind": "page"},
            "limit": {"$type": "meta", "kind": "limit"},
            "total": {"$type": "meta", "kind": "total"},
            "totalPages": {"$type": "meta", "kind": "totalPages"}
        },
        "stats": {
            "avg": {"$type": "meta", "kind": "avg", "field": "price"},
            "sum": {"$type": "meta", "kind": "sum", "field": "price"},
            "min": {"$type": "meta", "kind": "min", "field": "price"},
            "max": {"$type": "meta", "kind": "max", "field": "price"},
            "expensive": {"$type": "meta", "kind": "count", "where": {"price": {"$gte": 250}}}
        },
        "$comment": "internal",
        "apiVersion": "v1"
    }))
    .expect("shape");

    let response = engine
        .respond("products", &Query::new().page(2).limit(2), &shape, NO_INCLUDES)
        .await
        .expect("respond");

    assert_eq!(response["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(response["meta"]["page"], json!(2));
    assert_eq!(response["meta"]["limit"], json!(2));
    assert_eq!(response["meta"]["total"], json!(5));
    assert_eq!(response["meta"]["totalPages"], json!(3));
    assert_eq!(response["stats"]["avg"], json!(200));
    assert_eq!(response["stats"]["sum"], json!(1000));
    assert_eq!(response["stats"]["min"], json!(100));
    assert_eq!(response["stats"]["max"], json!(300));
    assert_eq!(response["stats"]["expensive"], json!(2));
    assert_eq!(response["apiVersion"], json!("v1"));
    assert!(response.get("$comment").is_none());
}

#[tokio::test]
async fn top_level_data_marker_returns_joined_page() {
    let engine = engine();
    engine.register(users(2)).expect("users");
    engine.register(orders(5)).expect("orders");

    let response = engine
        .respond(
            "orders",
            &Query::new().limit(3),
            &ResponseShape::parse(&json!({"$type": "data"})).expect("shape"),
            &["user"],
        )
        .await
        .expect("respond");

    let page = response.as_array().expect("bare array");
    assert_eq!(page.len(), 3);
    assert!(page.iter().all(|order| order["user"]["id"] == order["userId"]));
}

#[tokio::test]
async fn accessors_seed_untouched_targets() {
    let engine = engine();
    let users = engine.register(users(2)).expect("users");
    let orders = engine.register(orders(6)).expect("orders");

    let user = users.all().await.expect("users")[0].clone();
    assert!(!orders.is_initialized());

    let accessors = users.relation_accessors().await.expect("accessors");
    assert!(orders.is_initialized());
    let Related::Many(owned) = accessors["orders"].resolve(&user) else {
        panic!("hasMany resolves to a list");
    };
    assert_eq!(owned.len(), 3);
    assert!(owned.iter().all(|order| order.value("userId") == user.id().expect("id")));
}
