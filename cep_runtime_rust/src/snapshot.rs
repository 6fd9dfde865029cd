//! Snapshot — immutable capture of a session.
//!
//! A snapshot carries the opaque engine payload, a copy of the
//! retained fact window, and the full cumulative aggregate at capture
//! time. The aggregate travels in the snapshot precisely because the
//! window may not cover the whole insertion history — rebuild never
//! recomputes it from zero.
//!
//! Each snapshot embeds a SHA-256 integrity digest over its content;
//! verification failure is fatal for the rebuild attempt.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use cep_engine_replica::fact::Fact;

/// Snapshot decode / verification failures.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Integrity digest does not match the snapshot content.
    #[error("corrupt snapshot: integrity digest mismatch")]
    Corrupt,

    /// Wire payload could not be decoded.
    #[error("snapshot decode failed: {0}")]
    Decode(String),

    /// Wire payload exceeds the size guard.
    #[error("snapshot payload of {len} bytes exceeds limit of {max}")]
    Oversized { len: usize, max: usize },
}

/// Immutable, serialized capture of a session. Consumed once by
/// rebuild; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Opaque engine state payload, owned by the engine's codec.
    pub engine_payload: Vec<u8>,
    /// Retained fact window at capture time, in insertion order.
    pub window: Vec<Fact>,
    /// Full cumulative aggregate at capture time (not just the window).
    pub cumulative_aggregate: i64,
    /// SHA-256 over payload, window and aggregate. Lowercase hex.
    pub integrity: String,
}

impl SessionSnapshot {
    /// Capture a snapshot from its parts, computing the digest.
    pub fn new(engine_payload: Vec<u8>, window: Vec<Fact>, cumulative_aggregate: i64) -> Self {
        let integrity = integrity_digest(&engine_payload, &window, cumulative_aggregate);
        Self {
            engine_payload,
            window,
            cumulative_aggregate,
            integrity,
        }
    }

    /// Recompute the digest and compare. Run before every rebuild and
    /// after every wire decode.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        let expected =
            integrity_digest(&self.engine_payload, &self.window, self.cumulative_aggregate);
        if expected != self.integrity {
            return Err(SnapshotError::Corrupt);
        }
        Ok(())
    }
}

/// SHA-256 over the snapshot content in fixed order: engine payload,
/// then each window fact (producer, amount, timestamp as LE bytes),
/// then the aggregate. Lowercase hex.
fn integrity_digest(engine_payload: &[u8], window: &[Fact], aggregate: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(engine_payload);
    for fact in window {
        hasher.update(fact.producer_id.to_le_bytes());
        hasher.update(fact.amount.to_le_bytes());
        hasher.update(fact.timestamp_ms.to_le_bytes());
    }
    hasher.update(aggregate.to_le_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
