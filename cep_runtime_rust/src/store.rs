//! Session store — per-key critical section over the replicated cache.
//!
//! One lock object per session key, created insert-if-absent and never
//! removed: the map grows with the number of distinct group keys ever
//! seen. Acceptable only while the key space is bounded; a bounded
//! eviction scheme would have to avoid racing in-flight holders.
//!
//! Locks are never nested, so there is no cross-key deadlock. Mutual
//! exclusion is process-local only: two nodes can still race on one
//! key at the cache layer. The single-owner-per-key assumption is
//! inherited from the replication layer, not enforced here.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use cep_engine_replica::engine::EngineConfig;
use cep_engine_replica::fact::Fact;

use crate::cache::{CachedSession, ReplicatedCache, SessionKey};
use crate::channels::SessionChannels;
use crate::error::CoreError;
use crate::rebuild::rebuild;
use crate::session::HaSession;

/// Per-key serialized read-modify-write of sessions against the cache.
pub struct SessionStore<C: ReplicatedCache> {
    cache: C,
    config: Arc<dyn EngineConfig>,
    channels: SessionChannels,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<C: ReplicatedCache> SessionStore<C> {
    pub fn new(cache: C, config: Arc<dyn EngineConfig>, channels: SessionChannels) -> Self {
        Self {
            cache,
            config,
            channels,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Apply one fact to the group's session under the key's lock.
    ///
    /// Resolves the cached value first: absent → fresh session,
    /// serialized → rebuild (may emit one `replayed`), live → used
    /// directly. The insert emits one `live`; the session is written
    /// back before the lock is released. All failures propagate
    /// unchanged.
    pub fn insert_fact(&self, group: &str, fact: &Fact) -> Result<(), CoreError> {
        let key = SessionKey::from_group(group);
        let lock = self.lock_for(&key);
        let _guard = lock.lock();

        info!(target: "audit", %key, %fact, "starting to insert fact");

        let mut session = match self.cache.get(&key)? {
            None => {
                debug!(%key, "no cached session, starting empty");
                HaSession::new(self.config.clone(), self.channels.clone())
            }
            Some(CachedSession::Serialized(snapshot)) => {
                debug!(%key, window_len = snapshot.window.len(), "rebuilding cached snapshot");
                rebuild(snapshot, self.config.clone(), self.channels.clone())?
            }
            Some(CachedSession::Live(session)) => session,
        };

        if let Err(err) = session.insert(fact) {
            // The entry was leased from the cache; return the untouched
            // session before surfacing the engine failure.
            if let Err(put_err) = self.cache.put(&key, CachedSession::Live(session)) {
                warn!(%key, error = %put_err, "write-back after failed insert also failed");
            }
            return Err(err);
        }
        info!(target: "audit", %key, %fact, "rules invoked");

        self.cache.put(&key, CachedSession::Live(session))?;
        info!(target: "audit", %key, %fact, "fact inserted");
        Ok(())
    }

    /// The underlying cache handle. Hosts use this to seed entries
    /// arriving from another node.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Number of distinct keys the lock map has ever seen. Exposed so
    /// hosts can watch the documented unbounded-growth cost.
    pub fn tracked_key_count(&self) -> usize {
        self.locks.lock().len()
    }

    fn lock_for(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(key.as_str().to_string())
            .or_default()
            .clone()
    }
}
