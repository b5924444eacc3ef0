use std::collections::BTreeSet;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::contract::definitions_json_schema;
use crate::definition::CollectionDefinition;
use crate::error::{Error, Result};

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue with location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code: code.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            IssueSeverity::Error => self.errors.push(issue),
            IssueSeverity::Warning => self.warnings.push(issue),
        }
    }
}

/// Validate internal consistency of a single collection definition.
///
/// This checks:
/// - the name is non-empty
/// - relation names are usable as join path segments
/// - relation target, foreign key and referenced field are non-empty
pub fn validate_definition(definition: &CollectionDefinition) -> Result<()> {
    if definition.name.trim().is_empty() {
        return Err(Error::InvalidDefinition(
            "collection name must not be empty".to_string(),
        ));
    }

    for (name, relation) in &definition.relations {
        let location = format!("{}.relations.{}", definition.name, name);
        if name.is_empty() || name.contains('.') {
            return Err(Error::InvalidDefinition(format!(
                "{location}: relation names must be non-empty and must not contain '.'"
            )));
        }
        if relation.target.trim().is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "{location}: targetCollection must not be empty"
            )));
        }
        if relation.foreign_key.trim().is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "{location}: foreignKeyField must not be empty"
            )));
        }
        if relation.referenced_field.trim().is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "{location}: referencedField must not be empty"
            )));
        }
    }

    Ok(())
}

/// Validate a definitions document against the definitions JSON Schema.
pub fn validate_definitions_json(document: &Value) -> Result<ValidationReport> {
    let schema = serde_json::to_value(definitions_json_schema())?;
    let compiled = JSONSchema::compile(&schema).map_err(|err| Error::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();
    if let Err(errors) = compiled.validate(document) {
        for error in errors {
            let path = error.instance_path.to_string();
            report.push(ValidationIssue::error(
                "schema_violation",
                if path.is_empty() { "/".to_string() } else { path },
                error.to_string(),
            ));
        }
    }
    Ok(report)
}

/// Validate and parse a definitions document end-to-end.
pub fn parse_definitions(
    document: &Value,
) -> std::result::Result<Vec<CollectionDefinition>, ValidationReport> {
    let structural = match validate_definitions_json(document) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error("schema_validation_error", "/", err.to_string()));
            return Err(report);
        }
    };
    if !structural.is_ok() {
        return Err(structural);
    }

    let definitions: Vec<CollectionDefinition> = serde_json::from_value(document.clone())
        .map_err(|err| {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error("invalid_definitions_json", "/", err.to_string()));
            report
        })?;

    let mut report = ValidationReport::default();
    let mut seen = BTreeSet::new();
    for (index, definition) in definitions.iter().enumerate() {
        let path = format!("/{index}");
        if !seen.insert(definition.name.as_str()) {
            report.push(ValidationIssue::error(
                "duplicate_collection",
                path.clone(),
                format!("collection '{}' is defined more than once", definition.name),
            ));
        }
        if let Err(err) = validate_definition(definition) {
            report.push(ValidationIssue::error("invalid_definition", path, err.to_string()));
        }
    }

    if report.is_ok() {
        Ok(definitions)
    } else {
        Err(report)
    }
}
