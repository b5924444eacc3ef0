use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use serde::Serialize;
use tracing::debug;

use seedbed_core::{
    CollectionDefinition, DependencyGraph, Error as CoreError, FieldDescriptor, Operation,
    RelationSpec, validate_definition,
};

use crate::errors::Result;
use crate::store::CollectionStore;

/// Read-only registry metadata for external tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSnapshot {
    pub name: String,
    pub identifier: String,
    pub operations: Vec<Operation>,
    pub schema: BTreeMap<String, FieldDescriptor>,
    pub relations: BTreeMap<String, RelationSpec>,
    pub seed_count: Option<u64>,
}

/// Name -> store table shared by the components of one engine.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    entries: RwLock<BTreeMap<String, Arc<CollectionStore>>>,
    generation: AtomicU64,
    graph_cache: Mutex<Option<(u64, Arc<DependencyGraph>)>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, or return the existing store for an equal one.
    pub fn register(&self, definition: CollectionDefinition) -> Result<Arc<CollectionStore>> {
        validate_definition(&definition)?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(&definition.name) {
            if existing.definition().is_equivalent(&definition) {
                return Ok(Arc::clone(existing));
            }
            return Err(CoreError::DuplicateDefinition(definition.name).into());
        }

        let name = definition.name.clone();
        let store = Arc::new(CollectionStore::new(definition));
        entries.insert(name.clone(), Arc::clone(&store));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(collection = %name, generation, "collection registered");
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CollectionStore>> {
        self.read_entries().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_entries().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.read_entries().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// belongsTo graph over the current registrations.
    ///
    /// Built on first use and reused until another collection registers.
    pub fn dependency_graph(&self) -> Arc<DependencyGraph> {
        let generation = self.generation.load(Ordering::Acquire);
        let mut cache = self.graph_cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached, graph)) = cache.as_ref()
            && *cached == generation
        {
            return Arc::clone(graph);
        }

        let graph = {
            let entries = self.read_entries();
            Arc::new(DependencyGraph::from_definitions(
                entries.values().map(|store| store.definition()),
            ))
        };
        let summary = graph.summary();
        debug!(
            generation,
            nodes = summary.nodes,
            edges = summary.edges,
            "dependency graph resolved"
        );
        *cache = Some((generation, Arc::clone(&graph)));
        graph
    }

    /// Full seed order across every registered collection.
    pub fn seed_order(&self) -> Result<Vec<String>> {
        Ok(self.dependency_graph().seed_order()?)
    }

    /// Collections that must be seeded before `name`, in order.
    pub fn ancestors_in_order(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.dependency_graph().ancestors_in_order(name)?)
    }

    /// Registry metadata; never triggers seeding.
    pub fn export_snapshot(&self) -> Vec<CollectionSnapshot> {
        self.read_entries()
            .values()
            .map(|store| {
                let definition = store.definition();
                CollectionSnapshot {
                    name: definition.name.clone(),
                    identifier: definition.identifier().to_string(),
                    operations: definition.operations.enabled(),
                    schema: definition.schema.clone(),
                    relations: definition.relations.clone(),
                    seed_count: definition.seed_count,
                }
            })
            .collect()
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<CollectionStore>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;

    #[test]
    fn equal_definition_returns_existing_store() {
        let registry = CollectionRegistry::new();
        let first = registry
            .register(CollectionDefinition::new("users").with_seed_count(3))
            .unwrap();
        let second = registry
            .register(CollectionDefinition::new("users").with_seed_count(3))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let err = registry
            .register(CollectionDefinition::new("users").with_seed_count(4))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(
            err,
            EngineError::Core(CoreError::DuplicateDefinition(name)) if name == "users"
        ));
    }

    #[test]
    fn explicit_default_identifier_is_not_a_conflict() {
        let registry = CollectionRegistry::new();
        let first = registry.register(CollectionDefinition::new("users")).unwrap();
        let second = registry
            .register(CollectionDefinition::new("users").with_identifier("users"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn graph_is_cached_until_next_registration() {
        let registry = CollectionRegistry::new();
        registry.register(CollectionDefinition::new("users")).unwrap();
        let a = registry.dependency_graph();
        let b = registry.dependency_graph();
        assert!(Arc::ptr_eq(&a, &b));

        registry
            .register(
                CollectionDefinition::new("orders")
                    .with_relation("user", RelationSpec::belongs_to("users", "userId")),
            )
            .unwrap();
        let c = registry.dependency_graph();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(
            registry.seed_order().unwrap(),
            vec!["users".to_string(), "orders".to_string()]
        );
    }
}
