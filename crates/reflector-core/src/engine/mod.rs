//! Core race orchestrator
//!
//! The Reflector is responsible for:
//! - Dispatching one concurrent query task per oracle
//! - Enforcing the per-query deadline on top of caller cancellation
//! - Resolving the winner (first success) or collecting every success
//! - Emitting lifecycle events for external monitoring
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   query task    ┌──────────────────┐
//! │ OracleSet   │──── spawn ─────▶│ OracleClient     │ (one per
//! └─────────────┘   (per oracle)  │ (by transport)   │  transport)
//!                                 └──────────────────┘
//!                                          │
//!                              completion channel (bounded)
//!                                          │
//!                                          ▼
//!                                 ┌──────────────────┐
//!                                 │ draining loop    │── first success
//!                                 │ (single consumer)│── or full map
//!                                 └──────────────────┘
//! ```
//!
//! ## Race Flow
//!
//! 1. Validate the oracle set and resolve a client per oracle
//! 2. Spawn one detached task per oracle; each owns its socket
//! 3. Drain completions one at a time from a bounded channel
//! 4. First success wins; losers run to natural completion unobserved
//! 5. Exhaustion without a usable address fails with `NoConsensus`

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::oracle::{IpFamily, OracleDescriptor, OracleSet};
use crate::registry::OracleRegistry;
use crate::traits::OracleClient;

/// Capacity of the lifecycle event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Parameters of a single reflection call
///
/// Created per call and discarded after completion.
#[derive(Debug, Clone)]
pub struct ReflectionRequest {
    /// Address family the caller wants reported
    pub family: IpFamily,

    /// Deadline applied to each query individually; `None` or zero
    /// means the query runs under caller cancellation only
    pub per_query_timeout: Option<Duration>,

    /// Caller-driven cancellation, observed by every in-flight task
    pub cancellation: CancellationToken,
}

impl ReflectionRequest {
    /// Create a request with no per-query deadline and a fresh token
    pub fn new(family: IpFamily) -> Self {
        Self {
            family,
            per_query_timeout: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Bound each query by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_query_timeout = Some(timeout);
        self
    }

    /// Thread the caller's own cancellation token through the race
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Events emitted by the Reflector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectEvent {
    /// A query task was spawned for an oracle
    QueryDispatched { oracle: String },

    /// An oracle reported an address
    QuerySucceeded { oracle: String, address: IpAddr },

    /// An oracle failed or produced no address
    QueryFailed { oracle: String, error: String },

    /// First-success mode resolved a winner
    RaceWon { oracle: String, address: IpAddr },

    /// Every oracle failed or answered empty
    RaceExhausted { attempted: usize },
}

/// Completion message sent by each query task
type Completion = (String, Result<Option<IpAddr>>);

/// Race orchestrator over a set of address oracles
///
/// ## Concurrency
///
/// One detached task per oracle; the tasks share nothing but the
/// completion channel, which a single loop drains one message at a
/// time. First-success mode deliberately does NOT abort the losers:
/// they run to natural completion in the background and their results
/// are discarded, which keeps the observable timing and resource
/// release behavior independent of who wins.
pub struct Reflector {
    /// Per-transport clients
    registry: Arc<OracleRegistry>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReflectEvent>,
}

impl Reflector {
    /// Create a new reflector
    ///
    /// # Returns
    ///
    /// A tuple of (reflector, event_receiver) where event_receiver
    /// yields lifecycle events
    pub fn new(registry: Arc<OracleRegistry>) -> (Self, mpsc::Receiver<ReflectEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                registry,
                event_tx: tx,
            },
            rx,
        )
    }

    /// Race every oracle and return the first reported address
    ///
    /// Tasks are observed in completion order. A task that fails or
    /// answers empty is skipped and the wait continues; a single bad
    /// oracle only adds the latency of its own failure. When every
    /// task has been drained without a usable address the call fails
    /// with [`Error::NoConsensus`]; when the caller's token fires the
    /// call fails promptly with [`Error::Cancelled`].
    pub async fn reflect(&self, oracles: &OracleSet, request: &ReflectionRequest) -> Result<IpAddr> {
        let mut completions = self.dispatch(oracles, request)?;
        let mut remaining = oracles.len();

        while remaining > 0 {
            let completion = tokio::select! {
                // Checked first, so caller cancellation beats a backlog
                // of completions that themselves failed as cancelled.
                biased;
                _ = request.cancellation.cancelled() => return Err(Error::Cancelled),
                completion = completions.recv() => completion,
            };
            let Some((oracle, outcome)) = completion else {
                break;
            };
            remaining -= 1;

            match outcome {
                Ok(Some(address)) => {
                    info!("oracle {} won the race: {}", oracle, address);
                    self.emit_event(ReflectEvent::RaceWon {
                        oracle,
                        address,
                    });
                    return Ok(address);
                }
                Ok(None) => {
                    debug!("oracle {} answered without an address, skipping", oracle);
                }
                Err(e) => {
                    debug!("oracle {} failed, skipping: {}", oracle, e);
                }
            }
        }

        if request.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.emit_event(ReflectEvent::RaceExhausted {
            attempted: oracles.len(),
        });
        Err(Error::NoConsensus)
    }

    /// Query every oracle and collect all reported addresses
    ///
    /// Waits for every task to finish. The returned mapping holds one
    /// `(oracle id, address)` entry per successful non-empty answer,
    /// in completion order; failed tasks simply have no entry. An
    /// empty mapping is a valid result; interpreting the absence of
    /// consensus is left to the caller.
    pub async fn reflect_all(
        &self,
        oracles: &OracleSet,
        request: &ReflectionRequest,
    ) -> Result<Vec<(String, IpAddr)>> {
        let mut completions = self.dispatch(oracles, request)?;
        let mut results = Vec::new();
        let mut remaining = oracles.len();

        while remaining > 0 {
            let completion = tokio::select! {
                // Checked first, so caller cancellation beats a backlog
                // of completions that themselves failed as cancelled.
                biased;
                _ = request.cancellation.cancelled() => return Err(Error::Cancelled),
                completion = completions.recv() => completion,
            };
            let Some((oracle, outcome)) = completion else {
                break;
            };
            remaining -= 1;

            match outcome {
                Ok(Some(address)) => results.push((oracle, address)),
                Ok(None) => {
                    debug!("oracle {} answered without an address", oracle);
                }
                Err(e) => {
                    debug!("oracle {} failed: {}", oracle, e);
                }
            }
        }

        if request.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(results)
    }

    /// Spawn one query task per oracle and return the completion channel
    fn dispatch(
        &self,
        oracles: &OracleSet,
        request: &ReflectionRequest,
    ) -> Result<mpsc::Receiver<Completion>> {
        if oracles.is_empty() {
            return Err(Error::invalid_input("oracle set is empty"));
        }

        // Resolve every client before spawning anything, so a missing
        // transport registration fails the call without leaking tasks.
        let mut queries: Vec<(OracleDescriptor, Arc<dyn OracleClient>)> = Vec::new();
        for oracle in oracles.iter() {
            let client = self.registry.client_for(oracle.transport()).ok_or_else(|| {
                Error::invalid_input(format!(
                    "no client registered for transport {}",
                    oracle.transport()
                ))
            })?;
            queries.push((oracle.clone(), client));
        }

        // Capacity covers every task, so senders never block even after
        // the draining loop has returned.
        let (completion_tx, completion_rx) = mpsc::channel(queries.len());

        for (oracle, client) in queries {
            self.emit_event(ReflectEvent::QueryDispatched {
                oracle: oracle.id().to_string(),
            });

            let completion_tx = completion_tx.clone();
            let event_tx = self.event_tx.clone();
            let family = request.family;
            let deadline = request.per_query_timeout;
            let cancel = request.cancellation.clone();

            tokio::spawn(async move {
                let outcome = run_query(client, &oracle, family, deadline, cancel).await;

                match &outcome {
                    Ok(Some(address)) => emit(
                        &event_tx,
                        ReflectEvent::QuerySucceeded {
                            oracle: oracle.id().to_string(),
                            address: *address,
                        },
                    ),
                    Ok(None) => emit(
                        &event_tx,
                        ReflectEvent::QueryFailed {
                            oracle: oracle.id().to_string(),
                            error: "no address in response".to_string(),
                        },
                    ),
                    Err(e) => emit(
                        &event_tx,
                        ReflectEvent::QueryFailed {
                            oracle: oracle.id().to_string(),
                            error: e.to_string(),
                        },
                    ),
                }

                // The receiver may be gone once a winner was resolved.
                let _ = completion_tx.send((oracle.id().to_string(), outcome)).await;
            });
        }

        Ok(completion_rx)
    }

    /// Emit a lifecycle event
    fn emit_event(&self, event: ReflectEvent) {
        emit(&self.event_tx, event);
    }
}

/// Run one query under the per-query deadline
///
/// A timer expiry is reported as `Timeout` unless the caller's token is
/// already cancelled at that instant, in which case the cancellation
/// propagates unchanged. Simultaneous timeout and cancellation
/// therefore deterministically classify as `Cancelled`.
async fn run_query(
    client: Arc<dyn OracleClient>,
    oracle: &OracleDescriptor,
    family: IpFamily,
    deadline: Option<Duration>,
    cancel: CancellationToken,
) -> Result<Option<IpAddr>> {
    let query = client.query(oracle, family, cancel.clone());
    match deadline {
        Some(limit) if !limit.is_zero() => match tokio::time::timeout(limit, query).await {
            Ok(outcome) => outcome,
            Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
            Err(_) => Err(Error::timeout("per-query deadline exceeded")),
        },
        _ => query.await,
    }
}

fn emit(tx: &mpsc::Sender<ReflectEvent>, event: ReflectEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!("event channel full, dropping event");
        }
        // Nobody listening is fine; events are observability only.
        Err(TrySendError::Closed(_)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_fields() {
        let token = CancellationToken::new();
        let request = ReflectionRequest::new(IpFamily::V4)
            .with_timeout(Duration::from_secs(2))
            .with_cancellation(token.clone());

        assert_eq!(request.family, IpFamily::V4);
        assert_eq!(request.per_query_timeout, Some(Duration::from_secs(2)));
        token.cancel();
        assert!(request.cancellation.is_cancelled());
    }
}
