//! Rebuild — reconstruct a live session from a snapshot.
//!
//! 1. Verify the snapshot's integrity digest
//! 2. Rehydrate a fresh engine from the opaque payload
//! 3. Replay the retained window in original order (restores
//!    engine-internal derived state only; the aggregate comes from
//!    the snapshot, never recomputed from zero)
//! 4. Emit exactly one `replayed` reconciliation if the window was
//!    non-empty, zero otherwise
//!
//! Replay relies on the engine's idempotent `replay_fact`: whether the
//! serialized payload was captured before or after the window facts,
//! the rebuilt engine converges on the same state.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info};

use cep_engine_replica::engine::EngineConfig;

use crate::channels::SessionChannels;
use crate::error::CoreError;
use crate::session::HaSession;
use crate::snapshot::SessionSnapshot;

/// Consume a snapshot and return the reconstructed live session.
///
/// A window longer than the config's current bound (the bound may have
/// shrunk since capture) is trimmed oldest-first; the aggregate is
/// untouched by trimming.
pub fn rebuild(
    snapshot: SessionSnapshot,
    config: Arc<dyn EngineConfig>,
    channels: SessionChannels,
) -> Result<HaSession, CoreError> {
    snapshot.verify()?;

    let mut engine = config.deserialize(&snapshot.engine_payload)?;
    for fact in &snapshot.window {
        engine.replay_fact(fact)?;
    }

    // The reconciliation decision follows the window as captured, not
    // as trimmed: a shrunken bound must not silence it.
    let replayed_count = snapshot.window.len();
    let mut window: VecDeque<_> = snapshot.window.into();
    while window.len() > config.max_window_size() {
        window.pop_front();
    }
    let aggregate = snapshot.cumulative_aggregate;
    let session = HaSession::from_parts(engine, config, channels.clone(), window, aggregate);

    if replayed_count > 0 {
        info!(
            replayed_facts = replayed_count,
            aggregate, "session rebuilt from snapshot, emitting reconciliation"
        );
        channels.replayed.send(aggregate);
    } else {
        debug!("session rebuilt from empty snapshot, nothing to reconcile");
    }

    Ok(session)
}
