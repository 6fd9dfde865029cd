//! Engine contract consumed by the session runtime.
//!
//! The runtime never names a concrete engine type: it holds a
//! `Box<dyn RuleEngine>` built through an `EngineConfig`, the same way
//! the original node treats its rule engine as an injected
//! configuration. `replay_fact` exists so a rebuilt engine can be
//! brought back in sync from a retained fact window without knowing
//! how stale its serialized payload is.

use thiserror::Error;

use crate::fact::Fact;

/// Failures surfaced by a rule engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A producer's facts must carry strictly increasing timestamps.
    #[error("out-of-order fact for producer {producer_id}: last applied ts {last_ms}, got {got_ms}")]
    OutOfOrder {
        producer_id: u64,
        last_ms: u64,
        got_ms: u64,
    },

    /// Engine state could not be serialized.
    #[error("engine state serialization failed: {0}")]
    Serialize(String),

    /// An opaque payload could not be decoded into engine state.
    #[error("engine state deserialization failed: {0}")]
    Deserialize(String),

    /// Payload was produced by a different engine schema version.
    #[error("engine schema version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    /// Restored state failed internal consistency validation.
    #[error("engine invariant violation: {0}")]
    InvariantViolation(String),
}

/// A live rule-evaluation engine instance.
///
/// Working-memory mutation is all-or-nothing: when a method returns an
/// error the engine state is unchanged.
pub trait RuleEngine: Send {
    /// Insert a fresh fact into working memory.
    fn insert_fact(&mut self, fact: &Fact) -> Result<(), EngineError>;

    /// Re-apply a fact during rebuild. A fact at or before the
    /// producer's last applied timestamp is a no-op, so replaying a
    /// window over an up-to-date payload never double-counts.
    fn replay_fact(&mut self, fact: &Fact) -> Result<(), EngineError>;

    /// Serialize the full engine state into an opaque payload.
    fn serialize(&self) -> Result<Vec<u8>, EngineError>;

    /// Canonical hash of the current state, for drift comparison.
    fn state_hash(&self) -> String;
}

/// Factory and policy handle shared by every session of one store.
pub trait EngineConfig: Send + Sync {
    /// Build a fresh, empty engine instance.
    fn new_instance(&self) -> Box<dyn RuleEngine>;

    /// Rehydrate an engine from an opaque payload.
    fn deserialize(&self, payload: &[u8]) -> Result<Box<dyn RuleEngine>, EngineError>;

    /// Bound on the retained fact window kept for snapshot replay.
    fn max_window_size(&self) -> usize;
}
