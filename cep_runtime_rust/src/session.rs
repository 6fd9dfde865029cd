//! Session — live per-group aggregation state plus engine handle.
//!
//! Owned exclusively by whichever thread holds the group key's lock.
//! Insert ordering is engine-first:
//!   1. engine.insert_fact(fact)   — fallible, no local state touched
//!   2. aggregate += amount        — only after step 1 succeeded
//!   3. window append, FIFO evict beyond the bound
//!   4. one `live` emission carrying the new aggregate
//!
//! Eviction affects only what is retained for future snapshot replay;
//! the evicted fact's contribution to the aggregate is already folded
//! in and never subtracted.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use cep_engine_replica::engine::{EngineConfig, RuleEngine};
use cep_engine_replica::fact::Fact;

use crate::channels::SessionChannels;
use crate::error::CoreError;
use crate::snapshot::SessionSnapshot;

/// Live, mutable per-key session.
pub struct HaSession {
    engine: Box<dyn RuleEngine>,
    config: Arc<dyn EngineConfig>,
    channels: SessionChannels,
    window: VecDeque<Fact>,
    cumulative_aggregate: i64,
}

impl std::fmt::Debug for HaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaSession")
            .field("window", &self.window)
            .field("cumulative_aggregate", &self.cumulative_aggregate)
            .finish_non_exhaustive()
    }
}

impl HaSession {
    /// Create an empty session with a fresh engine instance.
    pub fn new(config: Arc<dyn EngineConfig>, channels: SessionChannels) -> Self {
        let engine = config.new_instance();
        Self {
            engine,
            config,
            channels,
            window: VecDeque::new(),
            cumulative_aggregate: 0,
        }
    }

    /// Reassemble a session from rebuilt parts. Rebuild-only entry
    /// point; emits nothing.
    pub(crate) fn from_parts(
        engine: Box<dyn RuleEngine>,
        config: Arc<dyn EngineConfig>,
        channels: SessionChannels,
        window: VecDeque<Fact>,
        cumulative_aggregate: i64,
    ) -> Self {
        Self {
            engine,
            config,
            channels,
            window,
            cumulative_aggregate,
        }
    }

    /// Apply one fact and emit one `live` notification.
    ///
    /// Atomic: if the engine rejects the fact, neither the aggregate
    /// nor the window is mutated and nothing is emitted.
    pub fn insert(&mut self, fact: &Fact) -> Result<i64, CoreError> {
        // Computed up front so an overflow fails before the engine is
        // touched; engines other than the reference one may not check.
        let new_aggregate = self
            .cumulative_aggregate
            .checked_add(fact.amount)
            .ok_or(CoreError::AggregateOverflow {
                amount: fact.amount,
            })?;

        self.engine.insert_fact(fact)?;

        self.cumulative_aggregate = new_aggregate;
        self.window.push_back(fact.clone());
        if self.window.len() > self.config.max_window_size() {
            self.window.pop_front();
        }

        trace!(
            producer_id = fact.producer_id,
            amount = fact.amount,
            aggregate = self.cumulative_aggregate,
            window_len = self.window.len(),
            "fact applied"
        );
        self.channels.live.send(self.cumulative_aggregate);
        Ok(self.cumulative_aggregate)
    }

    /// Capture an immutable snapshot of this session.
    ///
    /// No locking here: the caller already holds the group key's lock,
    /// or is the replication layer running between two inserts.
    pub fn snapshot(&self) -> Result<SessionSnapshot, CoreError> {
        let engine_payload = self.engine.serialize()?;
        Ok(SessionSnapshot::new(
            engine_payload,
            self.window.iter().cloned().collect(),
            self.cumulative_aggregate,
        ))
    }

    /// Running cumulative aggregate over the session lineage.
    pub fn aggregate(&self) -> i64 {
        self.cumulative_aggregate
    }

    /// Retained fact window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &Fact> {
        self.window.iter()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Canonical hash of the engine state, for drift comparison.
    pub fn engine_state_hash(&self) -> String {
        self.engine.state_hash()
    }
}
