use thiserror::Error;

/// Errors surfaced by pool math implementations.
///
/// Variants:
/// - `FatalError`: the pool state itself is broken; do not retry the same
///   simulation against it.
/// - `InvalidInput`: the request was malformed for this pool, e.g. a denom
///   the pool does not hold.
/// - `RecoverableError`: a transient failure, such as a network problem on
///   a remote pool. Retrying later may succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("fatal error: {0}")]
    FatalError(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("recoverable error: {0}")]
    RecoverableError(String),
}
