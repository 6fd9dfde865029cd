//! Wire codec for snapshots — hand-written protobuf types.
//!
//! This is the byte form the replication layer moves between nodes
//! and parks in the cache. Uses prost derive macros without
//! prost-build; field numbers are part of the wire contract.
//!
//! Decoding enforces a payload size guard and re-verifies the
//! embedded integrity digest before handing the snapshot out.

use prost::Message;

use cep_engine_replica::fact::Fact;

use crate::snapshot::{SessionSnapshot, SnapshotError};

/// Upper bound on an encoded snapshot. Anything larger is rejected
/// before decoding.
pub const MAX_SNAPSHOT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone, PartialEq, Message)]
pub struct ProtoFact {
    #[prost(uint64, tag = "1")]
    pub producer_id: u64,
    #[prost(int64, tag = "2")]
    pub amount: i64,
    #[prost(uint64, tag = "3")]
    pub timestamp_ms: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoSnapshot {
    #[prost(bytes = "vec", tag = "1")]
    pub engine_payload: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub window: Vec<ProtoFact>,
    #[prost(int64, tag = "3")]
    pub cumulative_aggregate: i64,
    #[prost(string, tag = "4")]
    pub integrity: String,
}

/// Encode a snapshot to its wire form.
pub fn encode_snapshot(snapshot: &SessionSnapshot) -> Vec<u8> {
    let proto = ProtoSnapshot {
        engine_payload: snapshot.engine_payload.clone(),
        window: snapshot
            .window
            .iter()
            .map(|f| ProtoFact {
                producer_id: f.producer_id,
                amount: f.amount,
                timestamp_ms: f.timestamp_ms,
            })
            .collect(),
        cumulative_aggregate: snapshot.cumulative_aggregate,
        integrity: snapshot.integrity.clone(),
    };
    proto.encode_to_vec()
}

/// Decode a wire payload back into a verified snapshot.
pub fn decode_snapshot(bytes: &[u8]) -> Result<SessionSnapshot, SnapshotError> {
    if bytes.len() > MAX_SNAPSHOT_BYTES {
        return Err(SnapshotError::Oversized {
            len: bytes.len(),
            max: MAX_SNAPSHOT_BYTES,
        });
    }

    let proto = ProtoSnapshot::decode(bytes).map_err(|e| SnapshotError::Decode(e.to_string()))?;
    let snapshot = SessionSnapshot {
        engine_payload: proto.engine_payload,
        window: proto
            .window
            .into_iter()
            .map(|f| Fact::new(f.producer_id, f.amount, f.timestamp_ms))
            .collect(),
        cumulative_aggregate: proto.cumulative_aggregate,
        integrity: proto.integrity,
    };
    snapshot.verify()?;
    Ok(snapshot)
}
