//! Race Contract Test: Collect-All and Consensus
//!
//! This test verifies the collect-all form and its composition with
//! the consensus resolver:
//! - The result mapping never exceeds the oracle-set size and every
//!   entry holds a non-empty address
//! - Failed oracles simply have no entry; an empty mapping is a valid
//!   result, not an error
//! - A 2-vs-1 majority resolves to the majority address

mod common;

use std::time::Duration;

use common::*;
use reflector_core::consensus;
use reflector_core::oracle::IpFamily;
use reflector_core::ReflectionRequest;

#[tokio::test]
async fn mapping_holds_one_entry_per_success() {
    let (reflector, _events, _client) = scripted_reflector(&[
        ("a", Script::Answer(addr("203.0.113.7"), Duration::from_millis(10))),
        ("b", Script::Fail(Duration::from_millis(10))),
        ("c", Script::Answer(addr("203.0.113.7"), Duration::from_millis(20))),
        ("d", Script::Empty(Duration::from_millis(10))),
    ]);

    let oracles = oracle_set(&["a", "b", "c", "d"]);
    let request = ReflectionRequest::new(IpFamily::V4);

    let results = reflector.reflect_all(&oracles, &request).await.unwrap();

    assert!(results.len() <= oracles.len());
    assert_eq!(results.len(), 2);
    let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
    assert!(ids.contains(&"a"));
    assert!(ids.contains(&"c"));
}

#[tokio::test]
async fn empty_mapping_is_a_valid_result() {
    let (reflector, _events, _client) = scripted_reflector(&[
        ("a", Script::Fail(Duration::from_millis(5))),
        ("b", Script::Empty(Duration::from_millis(5))),
    ]);

    let oracles = oracle_set(&["a", "b"]);
    let request = ReflectionRequest::new(IpFamily::V4);

    let results = reflector.reflect_all(&oracles, &request).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(consensus(&results), None);
}

#[tokio::test]
async fn majority_vote_over_collected_results() {
    let (reflector, _events, _client) = scripted_reflector(&[
        ("a", Script::Answer(addr("203.0.113.7"), Duration::from_millis(5))),
        ("b", Script::Answer(addr("203.0.113.7"), Duration::from_millis(10))),
        ("stale", Script::Answer(addr("198.51.100.1"), Duration::from_millis(15))),
    ]);

    let oracles = oracle_set(&["a", "b", "stale"]);
    let request = ReflectionRequest::new(IpFamily::V4);

    let results = reflector.reflect_all(&oracles, &request).await.unwrap();
    assert_eq!(results.len(), 3);

    // 2-vs-1: the stale oracle is outvoted.
    assert_eq!(consensus(&results), Some(addr("203.0.113.7")));
}

#[tokio::test]
async fn empty_oracle_set_is_invalid_input() {
    let (reflector, _events, _client) = scripted_reflector(&[]);

    let oracles = oracle_set(&[]);
    let request = ReflectionRequest::new(IpFamily::V4);

    let err = reflector.reflect_all(&oracles, &request).await.unwrap_err();
    assert!(matches!(err, reflector_core::Error::InvalidInput(_)));
}
