//! Core contracts for seedbed.
//!
//! This crate defines collection definitions, relation specs, records,
//! query/filter evaluation, response shapes and the seed dependency graph.
//! It performs no I/O; the async runtime lives in `seedbed-engine`.

pub mod contract;
pub mod definition;
pub mod error;
pub mod graph;
pub mod query;
pub mod record;
pub mod schema;
pub mod shape;
pub mod validation;

pub use contract::definitions_json_schema;
pub use definition::{CollectionDefinition, Operation, Operations, RelationKind, RelationSpec};
pub use error::{Error, Result};
pub use graph::{DependencyGraph, GraphSummary};
pub use query::{Condition, Filter, Pagination, Query, QueryResult, SortOrder};
pub use record::{CREATED_AT_FIELD, ID_FIELD, Record, UPDATED_AT_FIELD};
pub use schema::{FieldDescriptor, FieldKind};
pub use shape::{MetaKind, MetaMarker, ResponseShape, ShapeNode};
pub use validation::{
    IssueSeverity, ValidationIssue, ValidationReport, parse_definitions, validate_definition,
    validate_definitions_json,
};

/// Default `referencedField` for relations that do not name one.
pub const DEFAULT_REFERENCED_FIELD: &str = "id";
