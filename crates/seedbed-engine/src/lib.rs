//! Stateful collection engine for seedbed.
//!
//! Collections are registered from definitions, lazily seeded with
//! synthesized records in foreign-key order, served through CRUD and list
//! queries, and read back with joins and composed responses.

pub mod compose;
pub mod engine;
pub mod errors;
pub mod join;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod seeder;
pub mod store;
pub mod synth;

pub use compose::ResponseComposer;
pub use engine::{Collection, Engine, EngineBuilder};
pub use errors::{EngineError, RelationResolutionError, Result};
pub use join::{Related, RelationAccessor};
pub use logging::{LogFormat, init_logging};
pub use model::{EngineOptions, IdStrategy, PersistMode, SeedIssue, SeedReport, SeedSource};
pub use persistence::{JsonDirPersistence, MemoryPersistence, NoopPersistence, Persistence};
pub use registry::{CollectionRegistry, CollectionSnapshot};
pub use seeder::FkValuePool;
pub use store::CollectionStore;
pub use synth::{FakerSynthesizer, SynthesisContext, ValueSynthesizer};
