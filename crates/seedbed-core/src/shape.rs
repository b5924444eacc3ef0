//! Response shape descriptors.
//!
//! A descriptor is a JSON template. `{"$type": "data"}` marks where the data
//! page goes, `{"$type": "meta", "kind": ...}` marks a pagination value or
//! an aggregate, plain objects nest, and every other value is copied
//! verbatim. Descriptors are parsed once into a [`ShapeNode`] tree.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::query::Filter;

const TYPE_KEY: &str = "$type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    Page,
    Limit,
    Total,
    TotalPages,
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

impl MetaKind {
    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value {
            "page" => MetaKind::Page,
            "limit" => MetaKind::Limit,
            "total" => MetaKind::Total,
            "totalPages" => MetaKind::TotalPages,
            "avg" => MetaKind::Avg,
            "sum" => MetaKind::Sum,
            "min" => MetaKind::Min,
            "max" => MetaKind::Max,
            "count" => MetaKind::Count,
            _ => return None,
        };
        Some(kind)
    }

    /// Aggregates that need a numeric `field`.
    pub fn needs_field(&self) -> bool {
        matches!(self, MetaKind::Avg | MetaKind::Sum | MetaKind::Min | MetaKind::Max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaMarker {
    pub kind: MetaKind,
    pub field: Option<String>,
    /// Restricts the records an aggregate runs over.
    pub filter: Option<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeNode {
    Data,
    Meta(MetaMarker),
    Object(Vec<(String, ShapeNode)>),
    Passthrough(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseShape {
    root: ShapeNode,
}

impl ResponseShape {
    pub fn parse(descriptor: &Value) -> Result<Self> {
        match parse_node(descriptor)? {
            Some(root) => Ok(Self { root }),
            None => Err(Error::InvalidShape(
                "top-level descriptor is an unrecognized marker".to_string(),
            )),
        }
    }

    /// Shape that returns the data page unwrapped.
    pub fn data_only() -> Self {
        Self {
            root: ShapeNode::Data,
        }
    }

    pub fn root(&self) -> &ShapeNode {
        &self.root
    }
}

impl From<ShapeNode> for ResponseShape {
    fn from(root: ShapeNode) -> Self {
        Self { root }
    }
}

fn parse_node(value: &Value) -> Result<Option<ShapeNode>> {
    let Value::Object(map) = value else {
        return Ok(Some(ShapeNode::Passthrough(value.clone())));
    };

    match map.get(TYPE_KEY) {
        Some(Value::String(marker)) if marker == "data" => Ok(Some(ShapeNode::Data)),
        Some(Value::String(marker)) if marker == "meta" => parse_meta(map).map(Some),
        Some(_) => Ok(None),
        None => {
            let mut children = Vec::with_capacity(map.len());
            for (key, child) in map {
                if key.starts_with('$') {
                    continue;
                }
                if let Some(node) = parse_node(child)? {
                    children.push((key.clone(), node));
                }
            }
            Ok(Some(ShapeNode::Object(children)))
        }
    }
}

fn parse_meta(map: &Map<String, Value>) -> Result<ShapeNode> {
    let kind_name = map
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidShape("meta marker requires a 'kind'".to_string()))?;
    let kind = MetaKind::parse(kind_name)
        .ok_or_else(|| Error::InvalidShape(format!("unknown meta kind '{kind_name}'")))?;

    let field = map.get("field").and_then(Value::as_str).map(str::to_string);
    if kind.needs_field() && field.is_none() {
        return Err(Error::InvalidShape(format!(
            "meta kind '{kind_name}' requires a 'field'"
        )));
    }

    let filter = match map.get("where") {
        Some(value) => Some(
            Filter::from_value(value).map_err(|err| Error::InvalidShape(err.to_string()))?,
        ),
        None => None,
    };

    Ok(ShapeNode::Meta(MetaMarker {
        kind,
        field,
        filter,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_markers_and_skips_internal_keys() {
        let shape = ResponseShape::parse(&json!({
            "$comment": "ignored",
            "items": { "$type": "data" },
            "version": 2,
            "meta": {
                "total": { "$type": "meta", "kind": "total" },
                "avgPrice": { "$type": "meta", "kind": "avg", "field": "price" },
                "paid": { "$type": "meta", "kind": "count", "where": { "status": "paid" } },
                "future": { "$type": "sparkline" }
            }
        }))
        .expect("parse shape");

        let ShapeNode::Object(children) = shape.root() else {
            panic!("expected object root");
        };
        let mut keys: Vec<&str> = children.iter().map(|(key, _)| key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["items", "meta", "version"]);

        let meta = children
            .iter()
            .find_map(|(key, node)| (key == "meta").then_some(node));
        let Some(ShapeNode::Object(meta_children)) = meta else {
            panic!("expected meta object");
        };
        assert_eq!(meta_children.len(), 3);
        assert!(meta_children.iter().any(|(key, node)| key == "paid"
            && matches!(node, ShapeNode::Meta(MetaMarker { kind: MetaKind::Count, filter: Some(_), .. }))));
    }

    #[test]
    fn top_level_data_marker() {
        let shape = ResponseShape::parse(&json!({ "$type": "data" })).unwrap();
        assert_eq!(shape, ResponseShape::data_only());
    }

    #[test]
    fn aggregate_without_field_is_rejected() {
        let err = ResponseShape::parse(&json!({ "x": { "$type": "meta", "kind": "sum" } }))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidShape(_)));
    }
}
