//! Canonical hashing of engine state.
//!
//! Deterministic canonical serialization + SHA-256. Byte-identical
//! output across platforms:
//!   - schema_version first (part of the state identity)
//!   - lanes sorted by producer id (BTreeMap order)
//!   - fixed field order, no whitespace, no float

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::accumulator::EngineState;

/// Canonical serialization of engine state to UTF-8 JSON bytes.
pub fn canonical_serialize(state: &EngineState) -> Vec<u8> {
    let obj = build_canonical_value(state);
    serde_json::to_string(&obj)
        .expect("canonical_serialize: JSON serialization failed")
        .into_bytes()
}

/// SHA-256 of the canonical serialization. Lowercase hex string.
pub fn canonical_hash(state: &EngineState) -> String {
    let bytes = canonical_serialize(state);
    let digest = Sha256::digest(&bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Build the canonical serde_json::Value in strict field order.
///
/// Field order: schema_version, total, fact_count, lanes.
/// Lane field order: total, count, last_timestamp_ms.
fn build_canonical_value(state: &EngineState) -> Value {
    let mut lanes = Map::new();
    for (producer_id, lane) in &state.lanes {
        let mut lane_map = Map::new();
        lane_map.insert("total".to_string(), Value::Number(lane.total.into()));
        lane_map.insert("count".to_string(), Value::Number(lane.count.into()));
        lane_map.insert(
            "last_timestamp_ms".to_string(),
            Value::Number(lane.last_timestamp_ms.into()),
        );
        lanes.insert(producer_id.to_string(), Value::Object(lane_map));
    }

    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(state.schema_version.into()),
    );
    root.insert("total".to_string(), Value::Number(state.total.into()));
    root.insert(
        "fact_count".to_string(),
        Value::Number(state.fact_count.into()),
    );
    root.insert("lanes".to_string(), Value::Object(lanes));

    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RuleEngine;
    use crate::accumulator::AccumulatorEngine;
    use crate::fact::Fact;

    #[test]
    fn hash_is_deterministic_and_hex() {
        let mut engine = AccumulatorEngine::new();
        engine.insert_fact(&Fact::new(1, 10, 100)).unwrap();
        let h1 = canonical_hash(engine.state());
        let h2 = canonical_hash(engine.state());
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn different_states_hash_differently() {
        let mut a = AccumulatorEngine::new();
        let mut b = AccumulatorEngine::new();
        a.insert_fact(&Fact::new(1, 10, 100)).unwrap();
        b.insert_fact(&Fact::new(1, 11, 100)).unwrap();
        assert_ne!(canonical_hash(a.state()), canonical_hash(b.state()));
    }
}
