//! Determinism tests — same fact stream, same state, every time.

use cep_engine_replica::accumulator::AccumulatorEngine;
use cep_engine_replica::engine::RuleEngine;
use cep_engine_replica::fact::Fact;

/// Deterministic pseudo-random fact stream (LCG, fixed seed).
fn fact_stream(seed: u64, n: usize) -> Vec<Fact> {
    let mut state = seed;
    let mut facts = Vec::with_capacity(n);
    for step in 1..=n as u64 {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let producer = state % 4;
        let amount = ((state >> 8) % 1000) as i64 - 200;
        facts.push(Fact::new(producer, amount, step * 1000));
    }
    facts
}

fn run(facts: &[Fact]) -> AccumulatorEngine {
    let mut engine = AccumulatorEngine::new();
    for fact in facts {
        engine.insert_fact(fact).expect("stream is in order");
    }
    engine
}

// ─────────────────────────────────────────────────────────────
// Test 1: two runs over one stream produce identical hashes
// ─────────────────────────────────────────────────────────────

#[test]
fn two_runs_produce_identical_hashes() {
    let facts = fact_stream(42, 200);
    let h1 = run(&facts).state_hash();
    let h2 = run(&facts).state_hash();
    assert_eq!(h1, h2);
}

// ─────────────────────────────────────────────────────────────
// Test 2: serialize, restore, continue — same end state
// ─────────────────────────────────────────────────────────────

#[test]
fn restore_midstream_converges_with_straight_run() {
    let facts = fact_stream(7, 100);
    let straight = run(&facts);

    let mut first_half = AccumulatorEngine::new();
    for fact in &facts[..50] {
        first_half.insert_fact(fact).unwrap();
    }
    let payload = first_half.serialize().unwrap();
    let mut restored = AccumulatorEngine::from_payload(&payload).unwrap();
    for fact in &facts[50..] {
        restored.insert_fact(fact).unwrap();
    }

    assert_eq!(restored.state_hash(), straight.state_hash());
    assert_eq!(restored.state(), straight.state());
}

// ─────────────────────────────────────────────────────────────
// Test 3: replaying the full stream over a restored engine
// ─────────────────────────────────────────────────────────────

#[test]
fn full_replay_over_restored_engine_is_idempotent() {
    let facts = fact_stream(3, 60);
    let full = run(&facts);
    let payload = full.serialize().unwrap();

    let mut restored = AccumulatorEngine::from_payload(&payload).unwrap();
    for fact in &facts {
        restored.replay_fact(fact).unwrap();
    }
    assert_eq!(restored.state_hash(), full.state_hash());
}
