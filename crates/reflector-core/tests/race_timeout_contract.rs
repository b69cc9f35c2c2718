//! Race Contract Test: Deadlines and Cancellation
//!
//! This test verifies the layering of the per-query deadline on top of
//! caller cancellation:
//! - With every oracle unreachable, the call fails within roughly one
//!   deadline, not the sum of them
//! - A timer expiry is reported as a timeout, never mistaken for
//!   caller-initiated cancellation
//! - Caller cancellation is honored promptly while queries are in
//!   flight, and propagates as Cancelled, not as a timeout
//! - A zero deadline means "caller cancellation only"

mod common;

use std::time::{Duration, Instant};

use common::*;
use reflector_core::error::Error;
use reflector_core::oracle::IpFamily;
use reflector_core::{ReflectEvent, ReflectionRequest};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn unreachable_oracles_fail_within_one_deadline() {
    let (reflector, _events, _client) = scripted_reflector(&[
        ("dead-1", Script::Hang),
        ("dead-2", Script::Hang),
        ("dead-3", Script::Hang),
    ]);

    let oracles = oracle_set(&["dead-1", "dead-2", "dead-3"]);
    let request =
        ReflectionRequest::new(IpFamily::V4).with_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let err = reflector.reflect(&oracles, &request).await.unwrap_err();
    let elapsed = started.elapsed();

    // Per-oracle failures are swallowed; the call exhausts to
    // NoConsensus in ~one deadline because the queries run in parallel.
    assert!(matches!(err, Error::NoConsensus));
    assert!(
        elapsed < Duration::from_millis(600),
        "expected ~100ms, took {elapsed:?}"
    );
}

#[tokio::test]
async fn deadline_expiry_is_reported_as_timeout() {
    let (reflector, mut events, _client) =
        scripted_reflector(&[("dead", Script::Hang)]);

    let oracles = oracle_set(&["dead"]);
    let request =
        ReflectionRequest::new(IpFamily::V4).with_timeout(Duration::from_millis(50));

    let err = reflector.reflect(&oracles, &request).await.unwrap_err();
    assert!(matches!(err, Error::NoConsensus));

    // The per-query classification is observable through the event
    // stream: the failure must be a timeout, not a cancellation.
    let mut saw_timeout = false;
    while let Ok(event) = events.try_recv() {
        if let ReflectEvent::QueryFailed { oracle, error } = event {
            assert_eq!(oracle, "dead");
            assert!(
                error.contains("timed out"),
                "expected a timeout failure, got: {error}"
            );
            saw_timeout = true;
        }
    }
    assert!(saw_timeout);
}

#[tokio::test]
async fn caller_cancellation_is_prompt_and_distinct() {
    let (reflector, _events, _client) = scripted_reflector(&[
        ("dead-1", Script::Hang),
        ("dead-2", Script::Hang),
    ]);

    let oracles = oracle_set(&["dead-1", "dead-2"]);
    let token = CancellationToken::new();
    // A long deadline that must NOT be what resolves the call.
    let request = ReflectionRequest::new(IpFamily::V4)
        .with_timeout(Duration::from_secs(30))
        .with_cancellation(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = reflector.reflect(&oracles, &request).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::Cancelled));
    assert!(
        elapsed < Duration::from_millis(500),
        "cancellation took {elapsed:?}"
    );
}

#[tokio::test]
async fn zero_deadline_means_cancellation_only() {
    let (reflector, _events, _client) = scripted_reflector(&[(
        "slow",
        Script::Answer(addr("203.0.113.7"), Duration::from_millis(120)),
    )]);

    let oracles = oracle_set(&["slow"]);
    let request = ReflectionRequest::new(IpFamily::V4).with_timeout(Duration::ZERO);

    // A zero deadline does not bound the query at all.
    let address = reflector.reflect(&oracles, &request).await.unwrap();
    assert_eq!(address, addr("203.0.113.7"));
}

#[tokio::test]
async fn reflect_all_honors_cancellation() {
    let (reflector, _events, _client) = scripted_reflector(&[
        ("dead-1", Script::Hang),
        ("dead-2", Script::Hang),
    ]);

    let oracles = oracle_set(&["dead-1", "dead-2"]);
    let token = CancellationToken::new();
    let request = ReflectionRequest::new(IpFamily::V4).with_cancellation(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = reflector.reflect_all(&oracles, &request).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}
