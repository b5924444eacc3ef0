use thiserror::Error;

use seedbed_core::ValidationReport;

/// Errors emitted by the collection engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] seedbed_core::Error),
    #[error("definitions failed validation with {} error(s)", .0.errors.len())]
    InvalidDefinitions(ValidationReport),
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),
    #[error("operation '{operation}' is disabled for collection '{collection}'")]
    OperationDisabled {
        collection: String,
        operation: &'static str,
    },
    #[error("record with id {id} already exists in '{collection}'")]
    DuplicateId { collection: String, id: String },
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl EngineError {
    /// Structural errors (bad definitions, cycles) that must not be swallowed.
    pub fn is_configuration(&self) -> bool {
        matches!(self, EngineError::Core(err) if err.is_configuration())
    }
}

/// Failure to follow a relation during a join.
///
/// Callers turn these into `null` fields rather than failing the response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationResolutionError {
    #[error("collection '{0}' is not registered")]
    MissingCollection(String),
    #[error("collection '{collection}' has no relation '{relation}'")]
    MissingRelation { collection: String, relation: String },
    #[error("relation '{relation}' on '{collection}' targets unregistered collection '{target}'")]
    MissingTarget {
        collection: String,
        relation: String,
        target: String,
    },
    #[error("collection '{0}' is not available: initialization failed")]
    TargetUnavailable(String),
}

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
