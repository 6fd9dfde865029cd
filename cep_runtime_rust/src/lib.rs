#![forbid(unsafe_code)]

//! HA CEP session replication and replay core.
//!
//! Wraps a rule-evaluation engine with per-group sessions, bounded
//! fact windows, snapshot capture, and rebuild-on-recovery, all
//! behind a per-key critical section against a replicated cache.
//!
//! No rule semantics and no cache implementation live here — both are
//! collaborators reached through the traits in `cep_engine_replica`
//! and `cache`.

pub mod cache;
pub mod channels;
pub mod drift;
pub mod error;
pub mod rebuild;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod wire;
