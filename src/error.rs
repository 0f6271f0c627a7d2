use thiserror::Error;

/// Errors returned by generation operations.
#[derive(Error, Debug)]
pub enum GenError {
    /// The request shape is invalid (empty prompt, missing workspace,
    /// no reference for a reference-only request). Detected locally or
    /// reported by the service; never retried.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The bearer credential is missing or was rejected. Aborts the
    /// attempted operation without retry.
    #[error("Not authenticated: {0}")]
    Auth(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// The service returned a non-success HTTP status.
    #[error("Generation service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The referenced job or asset no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The job reached terminal `failed` status with a service-supplied
    /// message.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The generation itself succeeded but the resolved asset could not
    /// be fetched. Distinct from a generation failure.
    #[error("Result resolution failed: {0}")]
    Resolution(String),

    /// The response from the service was missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal bookkeeping failure (poisoned lock).
    #[error("{0}")]
    Other(String),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GenError>;
