//! Read-time relation resolution.
//!
//! Joins never write into the stores: related records are cloned and
//! attached to the returned copies only.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use seedbed_core::{Record, RelationKind, RelationSpec};

use crate::engine::EngineShared;
use crate::errors::RelationResolutionError;
use crate::store::CollectionStore;

/// Records reached through one relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Record>),
    Many(Vec<Record>),
}

impl Related {
    pub fn into_value(self) -> Value {
        match self {
            Related::One(record) => record.map(Record::into_value).unwrap_or(Value::Null),
            Related::Many(records) => {
                Value::Array(records.into_iter().map(Record::into_value).collect())
            }
        }
    }
}

/// Typed accessor for one named relation of a collection.
#[derive(Debug, Clone)]
pub struct RelationAccessor {
    name: String,
    spec: RelationSpec,
    target: Arc<CollectionStore>,
}

impl RelationAccessor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &RelationSpec {
        &self.spec
    }

    pub fn target(&self) -> &Arc<CollectionStore> {
        &self.target
    }

    /// Resolve against the target's current records.
    ///
    /// Accessors handed out by `Collection::relation_accessors` point at
    /// initialized targets.
    pub fn resolve(&self, record: &Record) -> Related {
        let spec = &self.spec;
        match spec.kind {
            RelationKind::BelongsTo => {
                let key = record.value(&spec.foreign_key);
                let found = self.target.find_by(&spec.referenced_field, key, true);
                Related::One(found.into_iter().next())
            }
            RelationKind::HasMany => {
                let key = record.value(&spec.referenced_field);
                Related::Many(self.target.find_by(&spec.foreign_key, key, false))
            }
            RelationKind::HasOne => {
                let key = record.value(&spec.referenced_field);
                let found = self.target.find_by(&spec.foreign_key, key, true);
                Related::One(found.into_iter().next())
            }
        }
    }
}

#[derive(Debug, Default)]
struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    fn from_paths<S: AsRef<str>>(paths: &[S]) -> Self {
        let mut tree = Self::default();
        for path in paths {
            let mut node = &mut tree;
            for segment in path.as_ref().split('.').filter(|segment| !segment.is_empty()) {
                node = node.children.entry(segment.to_string()).or_default();
            }
        }
        tree
    }
}

struct PlannedJoin {
    accessor: RelationAccessor,
    children: Vec<Planned>,
}

type Planned = (String, Result<PlannedJoin, RelationResolutionError>);

impl PlannedJoin {
    fn resolve(&self, record: &Record) -> Value {
        let attach_children = |mut related: Record| {
            attach(&mut related, &self.children);
            related.into_value()
        };
        match self.accessor.resolve(record) {
            Related::One(Some(related)) => attach_children(related),
            Related::One(None) => Value::Null,
            Related::Many(related) => Value::Array(related.into_iter().map(attach_children).collect()),
        }
    }
}

fn attach(record: &mut Record, planned: &[Planned]) {
    for (relation, join) in planned {
        let value = match join {
            Ok(join) if join.accessor.target.is_initialized() => join.resolve(record),
            _ => Value::Null,
        };
        record.insert(relation.clone(), value);
    }
}

/// Walks dot-separated relation paths through the registry.
pub(crate) struct JoinResolver<'a> {
    shared: &'a EngineShared,
}

impl<'a> JoinResolver<'a> {
    pub(crate) fn new(shared: &'a EngineShared) -> Self {
        Self { shared }
    }

    pub fn accessor(
        &self,
        collection: &str,
        relation: &str,
    ) -> Result<RelationAccessor, RelationResolutionError> {
        let registry = &self.shared.registry;
        let source = registry
            .get(collection)
            .ok_or_else(|| RelationResolutionError::MissingCollection(collection.to_string()))?;
        let spec = source.definition().relation(relation).cloned().ok_or_else(|| {
            RelationResolutionError::MissingRelation {
                collection: collection.to_string(),
                relation: relation.to_string(),
            }
        })?;
        let target =
            registry
                .get(&spec.target)
                .ok_or_else(|| RelationResolutionError::MissingTarget {
                    collection: collection.to_string(),
                    relation: relation.to_string(),
                    target: spec.target.clone(),
                })?;
        Ok(RelationAccessor {
            name: relation.to_string(),
            spec,
            target,
        })
    }

    /// Capability table: every resolvable relation of `collection` by name.
    pub fn accessors(
        &self,
        collection: &str,
    ) -> Result<BTreeMap<String, RelationAccessor>, RelationResolutionError> {
        let source = self
            .shared
            .registry
            .get(collection)
            .ok_or_else(|| RelationResolutionError::MissingCollection(collection.to_string()))?;
        Ok(source
            .definition()
            .relations
            .keys()
            .filter_map(|relation| {
                self.accessor(collection, relation)
                    .ok()
                    .map(|accessor| (relation.clone(), accessor))
            })
            .collect())
    }

    /// Resolve one path strictly, surfacing the first broken segment.
    pub async fn resolve_path(
        &self,
        collection: &str,
        record: &Record,
        path: &str,
    ) -> Result<Value, RelationResolutionError> {
        let planned = self.plan(collection, &IncludeTree::from_paths(&[path]));
        if let Some(err) = first_error(&planned) {
            return Err(err.clone());
        }
        if let Some(target) = self.prepare(&planned).await.into_iter().next() {
            return Err(RelationResolutionError::TargetUnavailable(target));
        }

        let mut resolved = record.clone();
        attach(&mut resolved, &planned);
        let relation = planned
            .first()
            .map(|(relation, _)| relation.as_str())
            .unwrap_or_default();
        Ok(resolved.remove(relation).unwrap_or(Value::Null))
    }

    /// Attach every include path to copies of `records`.
    ///
    /// Broken segments are logged once and become `null` fields.
    pub async fn include<S: AsRef<str>>(
        &self,
        collection: &str,
        records: Vec<Record>,
        paths: &[S],
    ) -> Vec<Record> {
        if paths.is_empty() {
            return records;
        }

        let planned = self.plan(collection, &IncludeTree::from_paths(paths));
        log_errors(collection, &planned);
        for target in self.prepare(&planned).await {
            warn!(collection = %collection, target = %target, "join target unavailable; field set to null");
        }

        records
            .into_iter()
            .map(|mut record| {
                attach(&mut record, &planned);
                record
            })
            .collect()
    }

    fn plan(&self, collection: &str, tree: &IncludeTree) -> Vec<Planned> {
        tree.children
            .iter()
            .map(|(relation, subtree)| {
                let join = self.accessor(collection, relation).map(|accessor| {
                    let children = self.plan(&accessor.spec.target, subtree);
                    PlannedJoin { accessor, children }
                });
                (relation.clone(), join)
            })
            .collect()
    }

    /// Initialize every reachable target; returns the ones that failed.
    async fn prepare(&self, planned: &[Planned]) -> Vec<String> {
        let mut targets = Vec::new();
        collect_targets(planned, &mut targets);

        let mut failed = Vec::new();
        for target in targets {
            if let Err(err) = target.initialize(self.shared).await {
                warn!(collection = %target.name(), error = %err, "join target failed to initialize");
                failed.push(target.name().to_string());
            }
        }
        failed
    }
}

fn collect_targets(planned: &[Planned], out: &mut Vec<Arc<CollectionStore>>) {
    for (_, join) in planned {
        if let Ok(join) = join {
            if !out.iter().any(|store| Arc::ptr_eq(store, &join.accessor.target)) {
                out.push(Arc::clone(&join.accessor.target));
            }
            collect_targets(&join.children, out);
        }
    }
}

fn first_error(planned: &[Planned]) -> Option<&RelationResolutionError> {
    planned.iter().find_map(|(_, join)| match join {
        Ok(join) => first_error(&join.children),
        Err(err) => Some(err),
    })
}

fn log_errors(collection: &str, planned: &[Planned]) {
    for (relation, join) in planned {
        match join {
            Ok(join) => log_errors(&join.accessor.spec.target, &join.children),
            Err(err) => {
                warn!(collection = %collection, relation = %relation, error = %err, "relation could not be resolved; field set to null");
            }
        }
    }
}
