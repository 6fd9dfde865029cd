#![forbid(unsafe_code)]

//! Deterministic reference rule engine for the HA CEP session core.
//!
//! Defines the narrow contract the runtime consumes (`RuleEngine`,
//! `EngineConfig`) plus one concrete engine: a per-producer
//! accumulator with versioned, invariant-checked serialization.
//!
//! No replication or session logic lives here — that belongs to
//! `cep_runtime_rust`.

/// Serialized engine state schema version. Payloads carrying any other
/// version are rejected on deserialization.
pub const ENGINE_SCHEMA_VERSION: u32 = 1;

pub mod accumulator;
pub mod engine;
pub mod fact;
pub mod hashing;
