use thiserror::Error;

/// Errors surfaced by the memory subsystem.
///
/// Every operation either returns a complete result or one of these kinds;
/// partial results are never returned silently. The best-effort operations
/// (`update_payload`, `delete`, `delete_batch`) report failure as `false`
/// instead of raising.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// An embedding or chat-completion call failed or returned malformed data.
    #[error("provider error: {0}")]
    Provider(String),

    /// A collection or point operation failed, including dimension mismatch.
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Caller-supplied weights, limits, or filters are out of contract.
    /// Raised before any external call is attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced point was required but does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

pub type MemoryResult<T> = Result<T, MemoryError>;
