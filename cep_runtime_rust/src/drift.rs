//! Drift detection — rebuild determinism verification.
//!
//! Rebuilding the same snapshot must always converge on the same
//! engine state. Hosts can run this before trusting a replica that
//! has been reconstructed on new hardware or after an upgrade.

use std::sync::Arc;

use cep_engine_replica::engine::EngineConfig;

use crate::channels::SessionChannels;
use crate::error::CoreError;
use crate::rebuild::rebuild;
use crate::snapshot::SessionSnapshot;

/// Summary of one verified rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub aggregate: i64,
    pub window_len: usize,
    pub engine_state_hash: String,
}

/// Rebuild the snapshot twice on muted channels and compare canonical
/// engine state hashes and aggregates. Divergence is surfaced as an
/// engine invariant violation.
pub fn verify_rebuild_determinism(
    snapshot: &SessionSnapshot,
    config: Arc<dyn EngineConfig>,
) -> Result<RebuildReport, CoreError> {
    let first = rebuild(snapshot.clone(), config.clone(), SessionChannels::muted())?;
    let second = rebuild(snapshot.clone(), config, SessionChannels::muted())?;

    let hash1 = first.engine_state_hash();
    let hash2 = second.engine_state_hash();
    if hash1 != hash2 || first.aggregate() != second.aggregate() {
        return Err(CoreError::Engine(
            cep_engine_replica::engine::EngineError::InvariantViolation(format!(
                "two rebuilds of one snapshot diverged: {} vs {}",
                hash1, hash2
            )),
        ));
    }

    Ok(RebuildReport {
        aggregate: first.aggregate(),
        window_len: first.window_len(),
        engine_state_hash: hash1,
    })
}
