use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use seedbed_core::{
    CollectionDefinition, Filter, Operation, Query, QueryResult, Record, ResponseShape,
    parse_definitions,
};

use crate::compose::ResponseComposer;
use crate::errors::{EngineError, RelationResolutionError, Result};
use crate::join::{JoinResolver, RelationAccessor};
use crate::model::{EngineOptions, SeedReport};
use crate::persistence::{JsonDirPersistence, NoopPersistence, Persistence};
use crate::registry::{CollectionRegistry, CollectionSnapshot};
use crate::store::CollectionStore;
use crate::synth::{FakerSynthesizer, ValueSynthesizer};

/// State shared by every collection of one engine.
pub(crate) struct EngineShared {
    pub(crate) registry: CollectionRegistry,
    pub(crate) synthesizer: Arc<dyn ValueSynthesizer>,
    pub(crate) persistence: Arc<dyn Persistence>,
    pub(crate) options: EngineOptions,
}

#[derive(Default)]
pub struct EngineBuilder {
    options: EngineOptions,
    synthesizer: Option<Arc<dyn ValueSynthesizer>>,
    persistence: Option<Arc<dyn Persistence>>,
}

impl EngineBuilder {
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: impl ValueSynthesizer + 'static) -> Self {
        self.synthesizer = Some(Arc::new(synthesizer));
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Missing collaborators default to the faker synthesizer and to
    /// `JsonDirPersistence` when `data_dir` is set (no-op otherwise).
    pub fn build(self) -> Engine {
        let options = self.options;
        let synthesizer = self
            .synthesizer
            .unwrap_or_else(|| Arc::new(FakerSynthesizer::new(options.rng_seed)));
        let persistence = self.persistence.unwrap_or_else(|| match &options.data_dir {
            Some(dir) => Arc::new(JsonDirPersistence::new(dir.clone())),
            None => Arc::new(NoopPersistence),
        });

        Engine {
            shared: Arc::new(EngineShared {
                registry: CollectionRegistry::new(),
                synthesizer,
                persistence,
                options,
            }),
        }
    }
}

/// Entry point: a registry of lazily seeded collections.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("collections", &self.shared.registry.names())
            .field("options", &self.shared.options)
            .finish()
    }
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Self::builder().with_options(options).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.shared.options
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.shared.registry
    }

    /// Register one collection. Seeding is deferred to first access.
    pub fn register(&self, definition: CollectionDefinition) -> Result<Collection> {
        let store = self.shared.registry.register(definition)?;
        Ok(self.handle(store))
    }

    pub fn register_all(
        &self,
        definitions: impl IntoIterator<Item = CollectionDefinition>,
    ) -> Result<Vec<Collection>> {
        definitions
            .into_iter()
            .map(|definition| self.register(definition))
            .collect()
    }

    /// Validate a JSON array of definitions and register all of them.
    pub fn load_definitions(&self, document: &Value) -> Result<Vec<Collection>> {
        let definitions = parse_definitions(document).map_err(EngineError::InvalidDefinitions)?;
        let collections = self.register_all(definitions)?;
        info!(collections = collections.len(), "definitions loaded");
        Ok(collections)
    }

    pub fn collection(&self, name: &str) -> Result<Collection> {
        self.shared
            .registry
            .get(name)
            .map(|store| self.handle(store))
            .ok_or_else(|| EngineError::UnknownCollection(name.to_string()))
    }

    pub fn seed_order(&self) -> Result<Vec<String>> {
        self.shared.registry.seed_order()
    }

    pub fn export_snapshot(&self) -> Vec<CollectionSnapshot> {
        self.shared.registry.export_snapshot()
    }

    /// Query, join and compose in one call.
    pub async fn respond<S: AsRef<str>>(
        &self,
        collection: &str,
        query: &Query,
        shape: &ResponseShape,
        includes: &[S],
    ) -> Result<Value> {
        self.collection(collection)?
            .respond(query, shape, includes)
            .await
    }

    fn handle(&self, store: Arc<CollectionStore>) -> Collection {
        Collection {
            store,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Handle to one registered collection.
///
/// Every call honors the definition's enabled operations.
#[derive(Clone)]
pub struct Collection {
    store: Arc<CollectionStore>,
    shared: Arc<EngineShared>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Collection {
    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn definition(&self) -> &CollectionDefinition {
        self.store.definition()
    }

    pub fn seed_report(&self) -> Option<SeedReport> {
        self.store.seed_report()
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    pub async fn initialize(&self) -> Result<()> {
        self.store.initialize(&self.shared).await
    }

    pub async fn list(&self, query: &Query) -> Result<QueryResult> {
        self.ensure(Operation::List)?;
        self.store.query(&self.shared, query).await
    }

    pub async fn get(&self, id: impl Into<Value>) -> Result<Option<Record>> {
        self.ensure(Operation::Get)?;
        self.store.get(&self.shared, &id.into()).await
    }

    pub async fn create(&self, record: Record) -> Result<Record> {
        self.ensure(Operation::Create)?;
        self.store.insert(&self.shared, record).await
    }

    pub async fn update(&self, id: impl Into<Value>, partial: Record) -> Result<Option<Record>> {
        self.ensure(Operation::Update)?;
        self.store.update(&self.shared, &id.into(), partial).await
    }

    pub async fn replace(&self, id: impl Into<Value>, full: Record) -> Result<Option<Record>> {
        self.ensure(Operation::Replace)?;
        self.store.replace(&self.shared, &id.into(), full).await
    }

    pub async fn delete(&self, id: impl Into<Value>) -> Result<bool> {
        self.ensure(Operation::Delete)?;
        self.store.delete(&self.shared, &id.into()).await
    }

    pub async fn count(&self, filter: Option<&Filter>) -> Result<u64> {
        self.ensure(Operation::List)?;
        self.store.count(&self.shared, filter).await
    }

    pub async fn all(&self) -> Result<Vec<Record>> {
        self.store.all(&self.shared).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear(&self.shared).await
    }

    /// Forget every record; the next access seeds again.
    pub fn reset(&self) {
        self.store.reset();
        info!(collection = %self.name(), "collection reset");
    }

    /// Copies of `records` with each include path attached.
    pub async fn include<S: AsRef<str>>(&self, records: Vec<Record>, paths: &[S]) -> Vec<Record> {
        JoinResolver::new(&self.shared)
            .include(self.name(), records, paths)
            .await
    }

    /// Follow one relation path strictly.
    pub async fn related(
        &self,
        record: &Record,
        path: &str,
    ) -> std::result::Result<Value, RelationResolutionError> {
        JoinResolver::new(&self.shared)
            .resolve_path(self.name(), record, path)
            .await
    }

    /// Resolvable relations by name, with every target store initialized.
    pub async fn relation_accessors(&self) -> Result<BTreeMap<String, RelationAccessor>> {
        let accessors = JoinResolver::new(&self.shared)
            .accessors(self.name())
            .unwrap_or_default();
        for accessor in accessors.values() {
            accessor.target().initialize(&self.shared).await?;
        }
        Ok(accessors)
    }

    pub async fn respond<S: AsRef<str>>(
        &self,
        query: &Query,
        shape: &ResponseShape,
        includes: &[S],
    ) -> Result<Value> {
        self.ensure(Operation::List)?;
        let (result, matched) = self.store.query_with_matches(&self.shared, query).await?;
        let page = self.include(result.data, includes).await;
        Ok(ResponseComposer::new(&page, &result.pagination, &matched).compose(shape))
    }

    fn ensure(&self, operation: Operation) -> Result<()> {
        if self.definition().operations.is_enabled(operation) {
            return Ok(());
        }
        Err(EngineError::OperationDisabled {
            collection: self.name().to_string(),
            operation: operation.as_str(),
        })
    }
}
