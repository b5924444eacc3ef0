use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_REFERENCED_FIELD;
use crate::schema::FieldDescriptor;

/// Cardinality of a relation between two collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    /// The referencing record stores the foreign key.
    BelongsTo,
    /// The foreign key lives on many records of the target collection.
    HasMany,
    /// The foreign key lives on (at most) one record of the target collection.
    HasOne,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::BelongsTo => "belongsTo",
            RelationKind::HasMany => "hasMany",
            RelationKind::HasOne => "hasOne",
        }
    }
}

/// Declared relation from one collection to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelationSpec {
    #[serde(rename = "targetCollection")]
    pub target: String,
    #[serde(rename = "foreignKeyField")]
    pub foreign_key: String,
    #[serde(default = "default_referenced_field")]
    pub referenced_field: String,
    pub kind: RelationKind,
}

fn default_referenced_field() -> String {
    DEFAULT_REFERENCED_FIELD.to_string()
}

impl RelationSpec {
    pub fn new(kind: RelationKind, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            foreign_key: foreign_key.into(),
            referenced_field: default_referenced_field(),
            kind,
        }
    }

    pub fn belongs_to(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::BelongsTo, target, foreign_key)
    }

    pub fn has_many(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::HasMany, target, foreign_key)
    }

    pub fn has_one(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::HasOne, target, foreign_key)
    }

    /// Override the field matched against the foreign key (defaults to `id`).
    pub fn referencing(mut self, field: impl Into<String>) -> Self {
        self.referenced_field = field.into();
        self
    }
}

/// Collection-level operation that can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Replace,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::List,
        Operation::Get,
        Operation::Create,
        Operation::Update,
        Operation::Replace,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Replace => "replace",
            Operation::Delete => "delete",
        }
    }
}

/// Per-operation enable flags; everything is enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Operations {
    pub list: bool,
    pub get: bool,
    pub create: bool,
    pub update: bool,
    pub replace: bool,
    pub delete: bool,
}

impl Default for Operations {
    fn default() -> Self {
        Self {
            list: true,
            get: true,
            create: true,
            update: true,
            replace: true,
            delete: true,
        }
    }
}

impl Operations {
    /// Only reads (`list`, `get`) enabled.
    pub fn read_only() -> Self {
        Self {
            create: false,
            update: false,
            replace: false,
            delete: false,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self, operation: Operation) -> bool {
        match operation {
            Operation::List => self.list,
            Operation::Get => self.get,
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Replace => self.replace,
            Operation::Delete => self.delete,
        }
    }

    pub fn enabled(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|operation| self.is_enabled(*operation))
            .collect()
    }
}

/// Declarative description of one record collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    /// Unique collection name.
    pub name: String,
    /// External handle for tooling; defaults to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Entity schema: field name to descriptor.
    #[serde(default)]
    pub schema: BTreeMap<String, FieldDescriptor>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationSpec>,
    /// Records synthesized on first access; the engine default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_count: Option<u64>,
    /// Free-form hint forwarded to the value synthesizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_hint: Option<String>,
    #[serde(default)]
    pub operations: Operations,
}

impl CollectionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: None,
            schema: BTreeMap::new(),
            relations: BTreeMap::new(),
            seed_count: None,
            seed_hint: None,
            operations: Operations::default(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.schema.insert(name.into(), descriptor);
        self
    }

    pub fn with_relation(mut self, name: impl Into<String>, relation: RelationSpec) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    pub fn with_seed_count(mut self, count: u64) -> Self {
        self.seed_count = Some(count);
        self
    }

    pub fn with_seed_hint(mut self, hint: impl Into<String>) -> Self {
        self.seed_hint = Some(hint.into());
        self
    }

    pub fn with_operations(mut self, operations: Operations) -> Self {
        self.operations = operations;
        self
    }

    pub fn identifier(&self) -> &str {
        self.identifier.as_deref().unwrap_or(&self.name)
    }

    /// Relations whose foreign key lives on this collection's records.
    pub fn belongs_to(&self) -> impl Iterator<Item = (&str, &RelationSpec)> {
        self.relations
            .iter()
            .filter(|(_, relation)| relation.kind == RelationKind::BelongsTo)
            .map(|(name, relation)| (name.as_str(), relation))
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.get(name)
    }

    /// Equality with the identifier defaulted to the name on both sides.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        let normalize = |definition: &Self| Self {
            identifier: Some(definition.identifier().to_string()),
            ..definition.clone()
        };
        normalize(self) == normalize(other)
    }
}
