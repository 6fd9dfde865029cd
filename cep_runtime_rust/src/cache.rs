//! Replicated cache boundary.
//!
//! The core never talks to a concrete replication layer; it sees a
//! `get`/`put` contract over tagged values. A `get` may hand back a
//! `Serialized` entry where a `Live` one was put — the replication
//! layer serializes sessions for transfer or persistence on its own
//! schedule, outside this core's control.
//!
//! `get` leases the node-local live entry to the caller, which re-puts
//! it before releasing the key's lock. This keeps a fetched session
//! exclusively owned by the lock holder. A leased entry that is never
//! returned (the write-back failed, the holder crashed) is not lost:
//! the cache retains a serialized copy of the last committed state and
//! hands that out on the next `get`.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;

use crate::session::HaSession;
use crate::snapshot::SessionSnapshot;
use crate::wire;

/// Distribution key for one group's session entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn from_group(group: &str) -> Self {
        Self(format!("session/{group}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tagged cache value: the two representations a `get` may resolve to.
pub enum CachedSession {
    Live(HaSession),
    Serialized(SessionSnapshot),
}

/// Cache-layer failures. Surfaced unchanged; retry policy, if any,
/// belongs to the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache entry encoding error: {0}")]
    Encoding(String),
}

/// The narrow contract the replication layer must satisfy.
pub trait ReplicatedCache: Send + Sync {
    fn get(&self, key: &SessionKey) -> Result<Option<CachedSession>, CacheError>;
    fn put(&self, key: &SessionKey, value: CachedSession) -> Result<(), CacheError>;
}

/// One resident cache entry: the live object, if currently parked
/// here, plus the serialized form of the last committed put. The
/// fallback is what survives a lease that never comes back.
struct Resident {
    live: Option<HaSession>,
    fallback: SessionSnapshot,
}

/// Single-process reference cache. Models the key-owner node: `get`
/// hands out the live object itself, leased until the next `put`
/// commits. Every put also refreshes the serialized fallback, so a
/// lost lease degrades to a rebuild from the last committed state
/// instead of losing the session.
#[derive(Default)]
pub struct LocalCache {
    entries: Mutex<HashMap<String, Resident>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplicatedCache for LocalCache {
    fn get(&self, key: &SessionKey) -> Result<Option<CachedSession>, CacheError> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key.as_str()) {
            None => Ok(None),
            Some(resident) => match resident.live.take() {
                Some(session) => Ok(Some(CachedSession::Live(session))),
                // The live object is out on a lease that was never
                // returned; serve the last committed state.
                None => Ok(Some(CachedSession::Serialized(resident.fallback.clone()))),
            },
        }
    }

    fn put(&self, key: &SessionKey, value: CachedSession) -> Result<(), CacheError> {
        let resident = match value {
            CachedSession::Live(session) => {
                let fallback = session
                    .snapshot()
                    .map_err(|e| CacheError::Encoding(e.to_string()))?;
                Resident {
                    live: Some(session),
                    fallback,
                }
            }
            CachedSession::Serialized(snapshot) => Resident {
                live: None,
                fallback: snapshot,
            },
        };
        self.entries.lock().insert(key.as_str().to_string(), resident);
        Ok(())
    }
}

/// Cache that serializes every live session on put, round-tripping it
/// through the wire codec. Models a non-owner replica: what a second
/// node observes after replication is always the serialized form.
#[derive(Default)]
pub struct SerializingCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl SerializingCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplicatedCache for SerializingCache {
    fn get(&self, key: &SessionKey) -> Result<Option<CachedSession>, CacheError> {
        match self.entries.lock().get(key.as_str()) {
            None => Ok(None),
            Some(bytes) => {
                let snapshot =
                    wire::decode_snapshot(bytes).map_err(|e| CacheError::Encoding(e.to_string()))?;
                Ok(Some(CachedSession::Serialized(snapshot)))
            }
        }
    }

    fn put(&self, key: &SessionKey, value: CachedSession) -> Result<(), CacheError> {
        let snapshot = match value {
            CachedSession::Serialized(snapshot) => snapshot,
            CachedSession::Live(session) => session
                .snapshot()
                .map_err(|e| CacheError::Encoding(e.to_string()))?,
        };
        let bytes = wire::encode_snapshot(&snapshot);
        self.entries.lock().insert(key.as_str().to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cep_engine_replica::accumulator::AccumulatorConfig;
    use cep_engine_replica::engine::EngineConfig;
    use cep_engine_replica::fact::Fact;

    use crate::channels::SessionChannels;

    fn live_session_with(amounts: &[i64]) -> HaSession {
        let config: Arc<dyn EngineConfig> = Arc::new(AccumulatorConfig::with_window(10));
        let mut session = HaSession::new(config, SessionChannels::muted());
        for (i, amount) in amounts.iter().enumerate() {
            session
                .insert(&Fact::new(1, *amount, (i as u64 + 1) * 100))
                .unwrap();
        }
        session
    }

    #[test]
    fn local_cache_hands_back_live_entry() {
        let cache = LocalCache::new();
        let key = SessionKey::from_group("g1");
        cache
            .put(&key, CachedSession::Live(live_session_with(&[10, 20])))
            .unwrap();

        match cache.get(&key).unwrap() {
            Some(CachedSession::Live(session)) => assert_eq!(session.aggregate(), 30),
            _ => panic!("expected a live entry"),
        }
    }

    #[test]
    fn unreturned_lease_degrades_to_last_committed_snapshot() {
        let cache = LocalCache::new();
        let key = SessionKey::from_group("g1");
        cache
            .put(&key, CachedSession::Live(live_session_with(&[10, 20])))
            .unwrap();

        // Lease the live object and drop it without re-putting, as a
        // holder whose write-back failed would.
        match cache.get(&key).unwrap() {
            Some(CachedSession::Live(session)) => drop(session),
            _ => panic!("expected a live entry"),
        }

        // The next get serves the serialized last committed state.
        match cache.get(&key).unwrap() {
            Some(CachedSession::Serialized(snapshot)) => {
                assert_eq!(snapshot.cumulative_aggregate, 30);
                assert_eq!(snapshot.window.len(), 2);
            }
            _ => panic!("expected the serialized fallback"),
        }
    }

    #[test]
    fn serializing_cache_converts_live_to_serialized() {
        let cache = SerializingCache::new();
        let key = SessionKey::from_group("g1");
        cache
            .put(&key, CachedSession::Live(live_session_with(&[10, 20, 30])))
            .unwrap();

        match cache.get(&key).unwrap() {
            Some(CachedSession::Serialized(snapshot)) => {
                assert_eq!(snapshot.cumulative_aggregate, 60);
                assert_eq!(snapshot.window.len(), 3);
            }
            _ => panic!("expected a serialized entry"),
        }
    }

    #[test]
    fn session_key_is_stable_for_a_group() {
        assert_eq!(
            SessionKey::from_group("orders-42"),
            SessionKey::from_group("orders-42")
        );
        assert_eq!(SessionKey::from_group("g").to_string(), "session/g");
    }
}
