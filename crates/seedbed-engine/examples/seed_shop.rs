use std::env;
use std::path::PathBuf;

use seedbed_core::{Query, ResponseShape};
use seedbed_engine::{Engine, EngineOptions, LogFormat, init_logging};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogFormat::Pretty)?;

    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut definitions_path: Option<PathBuf> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next().map(PathBuf::from),
            "--definitions" => definitions_path = args.next().map(PathBuf::from),
            _ => return Err(format!("unexpected argument '{arg}'").into()),
        }
    }

    let options = match config_path {
        Some(path) => EngineOptions::from_toml_path(&path)?,
        None => EngineOptions::default(),
    };
    let definitions = match definitions_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => shop_definitions(),
    };

    let engine = Engine::new(options);
    engine.load_definitions(&definitions)?;
    println!("seed order: {}", engine.seed_order()?.join(" -> "));

    let shape = ResponseShape::parse(&json!({
        "orders": {"$type": "data"},
        "page": {"$type": "meta", "kind": "page"},
        "totalPages": {"$type": "meta", "kind": "totalPages"},
        "revenue": {"$type": "meta", "kind": "sum", "field": "total"},
        "paid": {"$type": "meta", "kind": "count", "where": {"status": "paid"}}
    }))?;
    let response = engine
        .respond("orders", &Query::new().limit(5), &shape, &["user"])
        .await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    let snapshot = engine.export_snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn shop_definitions() -> serde_json::Value {
    json!([
        {
            "name": "users",
            "schema": {
                "name": { "kind": "primitive", "fieldType": "name" },
                "email": { "kind": "primitive", "fieldType": "email" }
            },
            "relations": {
                "orders": { "targetCollection": "orders", "foreignKeyField": "userId", "kind": "hasMany" }
            },
            "seedCount": 3
        },
        {
            "name": "orders",
            "schema": {
                "userId": { "kind": "primitive", "fieldType": "uuid" },
                "total": { "kind": "primitive", "fieldType": "price" },
                "status": { "kind": "primitive", "fieldType": "enum:open|paid" }
            },
            "relations": {
                "user": { "targetCollection": "users", "foreignKeyField": "userId", "kind": "belongsTo" }
            },
            "seedCount": 12
        }
    ])
}
