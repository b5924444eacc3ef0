use thiserror::Error;

/// Core error type shared across seedbed crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A collection definition violates internal invariants.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
    /// A collection name was registered twice with different shapes.
    #[error("collection '{0}' is already registered with a conflicting definition")]
    DuplicateDefinition(String),
    /// The belongsTo graph contains a cycle.
    #[error("cyclic dependency at collection '{collection}': {}", .path.join(" -> "))]
    CyclicDependency {
        collection: String,
        path: Vec<String>,
    },
    /// A query or filter document could not be interpreted.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// A response shape descriptor could not be interpreted.
    #[error("invalid response shape: {0}")]
    InvalidShape(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema error: {0}")]
    Schema(String),
}

impl Error {
    /// Structural errors that should abort startup rather than degrade.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidDefinition(_)
                | Error::DuplicateDefinition(_)
                | Error::CyclicDependency { .. }
        )
    }
}

/// Convenience alias for results returned by seedbed crates.
pub type Result<T> = std::result::Result<T, Error>;
