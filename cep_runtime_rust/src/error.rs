//! Core error taxonomy.
//!
//! Every failure propagates to the immediate caller unchanged; the
//! core never retries and never swallows. Variants map one-to-one
//! onto the collaborator that failed.

use thiserror::Error;

use cep_engine_replica::engine::EngineError;

use crate::cache::CacheError;
use crate::snapshot::SnapshotError;

/// Failure of one `insert_fact` or rebuild, attributed to its source.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The rule engine rejected or failed while applying a fact.
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),

    /// The replicated cache failed on get or put.
    #[error("cache failure: {0}")]
    Cache(#[from] CacheError),

    /// A snapshot payload could not be decoded or failed verification.
    #[error("snapshot failure: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Applying the fact would overflow the session's cumulative
    /// aggregate. The insert fails atomically.
    #[error("cumulative aggregate overflows i64 adding {amount}")]
    AggregateOverflow { amount: i64 },
}
