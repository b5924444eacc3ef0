use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::definition::CollectionDefinition;

/// Emit the JSON Schema for a definitions document (an array of collections).
pub fn definitions_json_schema() -> RootSchema {
    schema_for!(Vec<CollectionDefinition>)
}
