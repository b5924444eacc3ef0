#![allow(dead_code)]

use std::path::PathBuf;

use seedbed_core::{CollectionDefinition, FieldDescriptor, Record, RelationSpec};
use seedbed_engine::{Engine, EngineOptions};
use serde_json::Value;

pub fn users(seed_count: u64) -> CollectionDefinition {
    CollectionDefinition::new("users")
        .with_field("name", FieldDescriptor::primitive("name"))
        .with_field("email", FieldDescriptor::primitive("email"))
        .with_relation("orders", RelationSpec::has_many("orders", "userId"))
        .with_relation("profile", RelationSpec::has_one("profiles", "userId"))
        .with_seed_count(seed_count)
}

pub fn orders(seed_count: u64) -> CollectionDefinition {
    CollectionDefinition::new("orders")
        .with_field("userId", FieldDescriptor::primitive("uuid"))
        .with_field("total", FieldDescriptor::primitive("price"))
        .with_field("status", FieldDescriptor::primitive("enum:open|paid"))
        .with_relation("user", RelationSpec::belongs_to("users", "userId"))
        .with_relation("items", RelationSpec::has_many("order_items", "orderId"))
        .with_seed_count(seed_count)
}

pub fn order_items(seed_count: u64) -> CollectionDefinition {
    CollectionDefinition::new("order_items")
        .with_field("orderId", FieldDescriptor::primitive("uuid"))
        .with_field("quantity", FieldDescriptor::primitive("quantity"))
        .with_relation("order", RelationSpec::belongs_to("orders", "orderId"))
        .with_seed_count(seed_count)
}

pub fn profiles(seed_count: u64) -> CollectionDefinition {
    CollectionDefinition::new("profiles")
        .with_field("userId", FieldDescriptor::primitive("uuid"))
        .with_field("bio", FieldDescriptor::primitive("sentence"))
        .with_relation("user", RelationSpec::belongs_to("users", "userId"))
        .with_seed_count(seed_count)
}

pub fn engine() -> Engine {
    Engine::new(EngineOptions::default())
}

pub fn record(value: Value) -> Record {
    Record::from_value(value).expect("record must be a JSON object")
}

pub fn temp_data_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "seedbed_test_{label}_{}",
        uuid::Uuid::new_v4().simple()
    ));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
