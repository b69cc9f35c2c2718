//! Test doubles and common utilities for race-contract tests
//!
//! These scripted doubles stand in for the real transports so the
//! contract tests can exercise the orchestrator's observable behavior
//! (completion order, skip-and-continue, timeout classification)
//! without any network.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use reflector_core::error::{Error, Result};
use reflector_core::oracle::{IpFamily, OracleDescriptor, OracleSet, Transport};
use reflector_core::traits::OracleClient;
use reflector_core::{ReflectEvent, Reflector, OracleRegistry};

/// What a scripted oracle does when queried
#[derive(Debug, Clone)]
pub enum Script {
    /// Answer with an address after the delay
    Answer(IpAddr, Duration),
    /// Answer without an address after the delay
    Empty(Duration),
    /// Fail after the delay
    Fail(Duration),
    /// Never answer; resolves only through cancellation
    Hang,
}

/// An OracleClient whose behavior is scripted per oracle id
pub struct ScriptedOracleClient {
    scripts: HashMap<String, Script>,
    /// Queries started, across all oracles
    started: Arc<AtomicUsize>,
    /// Queries that ran to natural completion (not cancelled)
    completed: Arc<AtomicUsize>,
}

impl ScriptedOracleClient {
    pub fn new(scripts: &[(&str, Script)]) -> Self {
        Self {
            scripts: scripts
                .iter()
                .map(|(id, script)| (id.to_string(), script.clone()))
                .collect(),
            started: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OracleClient for ScriptedOracleClient {
    async fn query(
        &self,
        oracle: &OracleDescriptor,
        _family: IpFamily,
        cancel: CancellationToken,
    ) -> Result<Option<IpAddr>> {
        self.started.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .get(oracle.id())
            .cloned()
            .unwrap_or(Script::Fail(Duration::ZERO));

        let delay = match &script {
            Script::Answer(_, delay) | Script::Empty(delay) | Script::Fail(delay) => *delay,
            Script::Hang => {
                cancel.cancelled().await;
                return Err(Error::Cancelled);
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        match script {
            Script::Answer(address, _) => Ok(Some(address)),
            Script::Empty(_) => Ok(None),
            Script::Fail(_) => Err(Error::Other("scripted failure".to_string())),
            Script::Hang => unreachable!(),
        }
    }

    fn transport(&self) -> Transport {
        Transport::TlsHttp
    }
}

/// Build a reflector whose TLS-HTTP transport follows `scripts`
pub fn scripted_reflector(
    scripts: &[(&str, Script)],
) -> (Reflector, mpsc::Receiver<ReflectEvent>, Arc<ScriptedOracleClient>) {
    let client = Arc::new(ScriptedOracleClient::new(scripts));
    let registry = Arc::new(OracleRegistry::new());
    registry.register_client(client.clone() as Arc<dyn OracleClient>);

    let (reflector, events) = Reflector::new(registry);
    (reflector, events, client)
}

/// Descriptor for a scripted oracle id
pub fn oracle(id: &str) -> OracleDescriptor {
    OracleDescriptor::parse(id, &format!("https://{id}.test")).expect("test descriptor")
}

/// Ordered set over scripted oracle ids
pub fn oracle_set(ids: &[&str]) -> OracleSet {
    ids.iter().map(|id| oracle(id)).collect()
}

/// Parse a test address
pub fn addr(s: &str) -> IpAddr {
    s.parse().expect("test address")
}
