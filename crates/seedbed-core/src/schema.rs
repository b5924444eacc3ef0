use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Shape of a field as produced by the schema DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Primitive,
    Object,
    Array,
}

/// Opaque field descriptor handed to the value synthesizer.
///
/// Relation information is never derived from descriptors; it is declared
/// on the collection definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    /// Semantic type hint (e.g. `email`, `price`, `uuid`).
    pub field_type: String,
    /// Object members, or the element members of an array of objects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, FieldDescriptor>,
}

impl FieldDescriptor {
    pub fn primitive(field_type: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::Primitive,
            field_type: field_type.into(),
            children: BTreeMap::new(),
        }
    }

    pub fn object<I, K>(children: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldDescriptor)>,
        K: Into<String>,
    {
        Self {
            kind: FieldKind::Object,
            field_type: "object".to_string(),
            children: children.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Array whose elements are primitives of `field_type`.
    pub fn array_of(field_type: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::Array,
            field_type: field_type.into(),
            children: BTreeMap::new(),
        }
    }

    /// Array whose elements are objects with the given members.
    pub fn array_of_objects<I, K>(children: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldDescriptor)>,
        K: Into<String>,
    {
        Self {
            kind: FieldKind::Array,
            field_type: "object".to_string(),
            children: children.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Descriptor used for a single array element.
    pub fn element(&self) -> FieldDescriptor {
        if self.children.is_empty() {
            FieldDescriptor::primitive(self.field_type.clone())
        } else {
            FieldDescriptor {
                kind: FieldKind::Object,
                field_type: "object".to_string(),
                children: self.children.clone(),
            }
        }
    }
}
