//! Accumulator engine — the deterministic reference implementation.
//!
//! Working memory is a set of per-producer lanes. Each lane tracks the
//! running total, fact count and last applied timestamp for one
//! producer; the engine tracks the overall total and count across all
//! lanes. Timestamps must be strictly increasing per producer.
//!
//! Serialized state is versioned JSON. Deserialization is strict:
//! unknown fields, a foreign schema version, or totals that do not
//! reconcile with the lanes all reject the payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineConfig, EngineError, RuleEngine};
use crate::fact::Fact;
use crate::hashing::canonical_hash;
use crate::ENGINE_SCHEMA_VERSION;

/// Per-producer working-memory lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Lane {
    pub total: i64,
    pub count: u64,
    pub last_timestamp_ms: u64,
}

/// Full serializable engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineState {
    pub schema_version: u32,
    pub total: i64,
    pub fact_count: u64,
    pub lanes: BTreeMap<u64, Lane>,
}

impl EngineState {
    fn empty() -> Self {
        Self {
            schema_version: ENGINE_SCHEMA_VERSION,
            total: 0,
            fact_count: 0,
            lanes: BTreeMap::new(),
        }
    }

    /// Cross-check totals against the lanes. Run on every restore.
    fn validate(&self) -> Result<(), EngineError> {
        let lane_total: i64 = self.lanes.values().map(|l| l.total).sum();
        if lane_total != self.total {
            return Err(EngineError::InvariantViolation(format!(
                "lane totals sum to {} but engine total is {}",
                lane_total, self.total
            )));
        }
        let lane_count: u64 = self.lanes.values().map(|l| l.count).sum();
        if lane_count != self.fact_count {
            return Err(EngineError::InvariantViolation(format!(
                "lane counts sum to {} but engine count is {}",
                lane_count, self.fact_count
            )));
        }
        Ok(())
    }
}

/// Engine configuration: factory handle plus runtime knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulatorConfig {
    /// Bound on the retained fact window kept for snapshot replay.
    pub max_window_size: usize,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            max_window_size: 1024,
        }
    }
}

impl AccumulatorConfig {
    pub fn with_window(max_window_size: usize) -> Self {
        Self { max_window_size }
    }
}

impl EngineConfig for AccumulatorConfig {
    fn new_instance(&self) -> Box<dyn RuleEngine> {
        Box::new(AccumulatorEngine::new())
    }

    fn deserialize(&self, payload: &[u8]) -> Result<Box<dyn RuleEngine>, EngineError> {
        Ok(Box::new(AccumulatorEngine::from_payload(payload)?))
    }

    fn max_window_size(&self) -> usize {
        self.max_window_size
    }
}

/// The reference engine.
#[derive(Debug)]
pub struct AccumulatorEngine {
    state: EngineState,
}

impl AccumulatorEngine {
    pub fn new() -> Self {
        Self {
            state: EngineState::empty(),
        }
    }

    /// Rehydrate from a serialized payload. Strict: version, field set
    /// and internal consistency are all enforced before any state is
    /// accepted.
    pub fn from_payload(payload: &[u8]) -> Result<Self, EngineError> {
        let state: EngineState = serde_json::from_slice(payload)
            .map_err(|e| EngineError::Deserialize(e.to_string()))?;
        if state.schema_version != ENGINE_SCHEMA_VERSION {
            return Err(EngineError::VersionMismatch {
                expected: ENGINE_SCHEMA_VERSION,
                got: state.schema_version,
            });
        }
        state.validate()?;
        Ok(Self { state })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Apply one fact. All-or-nothing: every check and checked-add runs
    /// before the first field is written.
    fn apply(&mut self, fact: &Fact) -> Result<(), EngineError> {
        let lane = self.state.lanes.get(&fact.producer_id);
        if let Some(lane) = lane {
            if fact.timestamp_ms <= lane.last_timestamp_ms {
                return Err(EngineError::OutOfOrder {
                    producer_id: fact.producer_id,
                    last_ms: lane.last_timestamp_ms,
                    got_ms: fact.timestamp_ms,
                });
            }
        }

        let new_total = self.state.total.checked_add(fact.amount).ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "engine total overflows i64 adding {}",
                fact.amount
            ))
        })?;
        let new_lane_total = lane
            .map_or(0, |l| l.total)
            .checked_add(fact.amount)
            .ok_or_else(|| {
                EngineError::InvariantViolation(format!(
                    "lane total overflows i64 adding {}",
                    fact.amount
                ))
            })?;
        let new_lane_count = lane.map_or(0, |l| l.count) + 1;

        self.state.lanes.insert(
            fact.producer_id,
            Lane {
                total: new_lane_total,
                count: new_lane_count,
                last_timestamp_ms: fact.timestamp_ms,
            },
        );
        self.state.total = new_total;
        self.state.fact_count += 1;
        Ok(())
    }
}

impl Default for AccumulatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine for AccumulatorEngine {
    fn insert_fact(&mut self, fact: &Fact) -> Result<(), EngineError> {
        self.apply(fact)
    }

    fn replay_fact(&mut self, fact: &Fact) -> Result<(), EngineError> {
        // Already-applied facts are identified by the per-producer
        // timestamp watermark and skipped.
        if let Some(lane) = self.state.lanes.get(&fact.producer_id) {
            if fact.timestamp_ms <= lane.last_timestamp_ms {
                return Ok(());
            }
        }
        self.apply(fact)
    }

    fn serialize(&self) -> Result<Vec<u8>, EngineError> {
        serde_json::to_vec(&self.state).map_err(|e| EngineError::Serialize(e.to_string()))
    }

    fn state_hash(&self) -> String {
        canonical_hash(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(producer: u64, amount: i64, ts: u64) -> Fact {
        Fact::new(producer, amount, ts)
    }

    // ── Test 1: totals accumulate across producers ──────────────────

    #[test]
    fn totals_accumulate_across_producers() {
        let mut engine = AccumulatorEngine::new();
        engine.insert_fact(&fact(1, 10, 100)).unwrap();
        engine.insert_fact(&fact(2, 20, 100)).unwrap();
        engine.insert_fact(&fact(1, 30, 200)).unwrap();

        assert_eq!(engine.state().total, 60);
        assert_eq!(engine.state().fact_count, 3);
        assert_eq!(engine.state().lanes[&1].total, 40);
        assert_eq!(engine.state().lanes[&2].total, 20);
    }

    // ── Test 2: out-of-order fact is rejected, state untouched ──────

    #[test]
    fn out_of_order_fact_rejected_without_mutation() {
        let mut engine = AccumulatorEngine::new();
        engine.insert_fact(&fact(1, 10, 100)).unwrap();
        let before = engine.state().clone();

        let err = engine.insert_fact(&fact(1, 99, 100)).unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrder { .. }));
        assert_eq!(engine.state(), &before);
    }

    // ── Test 3: replay of an applied fact is a no-op ────────────────

    #[test]
    fn replay_of_applied_fact_is_noop() {
        let mut engine = AccumulatorEngine::new();
        engine.insert_fact(&fact(1, 10, 100)).unwrap();
        engine.insert_fact(&fact(1, 20, 200)).unwrap();

        engine.replay_fact(&fact(1, 10, 100)).unwrap();
        engine.replay_fact(&fact(1, 20, 200)).unwrap();
        assert_eq!(engine.state().total, 30);
        assert_eq!(engine.state().fact_count, 2);

        // A genuinely new fact still applies through the replay path.
        engine.replay_fact(&fact(1, 30, 300)).unwrap();
        assert_eq!(engine.state().total, 60);
    }

    // ── Test 4: serialize / deserialize round-trip preserves hash ───

    #[test]
    fn payload_roundtrip_preserves_state_hash() {
        let mut engine = AccumulatorEngine::new();
        engine.insert_fact(&fact(1, 10, 100)).unwrap();
        engine.insert_fact(&fact(7, -5, 100)).unwrap();

        let payload = engine.serialize().unwrap();
        let restored = AccumulatorEngine::from_payload(&payload).unwrap();
        assert_eq!(restored.state(), engine.state());
        assert_eq!(restored.state_hash(), engine.state_hash());
    }

    // ── Test 5: foreign schema version rejected ─────────────────────

    #[test]
    fn foreign_schema_version_rejected() {
        let mut engine = AccumulatorEngine::new();
        engine.insert_fact(&fact(1, 10, 100)).unwrap();
        let mut state = engine.state().clone();
        state.schema_version = 99;
        let payload = serde_json::to_vec(&state).unwrap();

        let err = AccumulatorEngine::from_payload(&payload).unwrap_err();
        assert!(matches!(
            err,
            EngineError::VersionMismatch {
                expected: 1,
                got: 99
            }
        ));
    }

    // ── Test 6: tampered totals rejected on restore ─────────────────

    #[test]
    fn tampered_totals_rejected_on_restore() {
        let mut engine = AccumulatorEngine::new();
        engine.insert_fact(&fact(1, 10, 100)).unwrap();
        let mut state = engine.state().clone();
        state.total = 11;
        let payload = serde_json::to_vec(&state).unwrap();

        let err = AccumulatorEngine::from_payload(&payload).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
    }

    // ── Test 7: unknown payload fields rejected ─────────────────────

    #[test]
    fn unknown_payload_fields_rejected() {
        let payload =
            br#"{"schema_version":1,"total":0,"fact_count":0,"lanes":{},"extra":true}"#;
        let err = AccumulatorEngine::from_payload(payload).unwrap_err();
        assert!(matches!(err, EngineError::Deserialize(_)));
    }
}
