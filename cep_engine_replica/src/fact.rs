//! Fact — the immutable input record.
//!
//! Facts are pure data: a producer id distinguishing independent
//! sub-streams within one group, a numeric amount, and a timestamp.
//! They carry no behavior; per-group insertion order is authoritative
//! and enforced upstream.

use serde::{Deserialize, Serialize};

/// One immutable input event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub producer_id: u64,
    pub amount: i64,
    pub timestamp_ms: u64,
}

impl Fact {
    pub fn new(producer_id: u64, amount: i64, timestamp_ms: u64) -> Self {
        Self {
            producer_id,
            amount,
            timestamp_ms,
        }
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fact{{producer={}, amount={}, ts={}}}",
            self.producer_id, self.amount, self.timestamp_ms
        )
    }
}
