//! Minimal embedding example for reflector-core
//!
//! This example demonstrates using reflector-core as a library with a
//! custom in-process oracle transport. The engine races the "oracles"
//! exactly as it would race real network endpoints.

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use reflector_core::{
    IpFamily, OracleClient, OracleDescriptor, OracleRegistry, OracleSet, ReflectionRequest,
    Reflector, Result, Transport, consensus,
};

/// Custom oracle transport for embedded usage
///
/// Pretends every HTTP oracle answers with the same address after a
/// short, per-oracle delay derived from its id.
struct EmbeddedOracleClient {
    answer: IpAddr,
}

#[async_trait]
impl OracleClient for EmbeddedOracleClient {
    async fn query(
        &self,
        oracle: &OracleDescriptor,
        _family: IpFamily,
        _cancel: CancellationToken,
    ) -> Result<Option<IpAddr>> {
        let delay = 10 + (oracle.id().len() as u64 % 5) * 10;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(Some(self.answer))
    }

    fn transport(&self) -> Transport {
        Transport::TlsHttp
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let registry = Arc::new(OracleRegistry::new());
    registry.register_client(Arc::new(EmbeddedOracleClient {
        answer: "203.0.113.7".parse()?,
    }));

    let mut oracles = OracleSet::new();
    oracles.push(OracleDescriptor::parse("alpha", "https://alpha.example")?);
    oracles.push(OracleDescriptor::parse("beta", "https://beta.example")?);
    oracles.push(OracleDescriptor::parse("gamma", "https://gamma.example")?);

    let (reflector, _events) = Reflector::new(registry);
    let request = ReflectionRequest::new(IpFamily::V4).with_timeout(Duration::from_secs(2));

    // First success
    let address = reflector.reflect(&oracles, &request).await?;
    println!("first answer: {address}");

    // Collect-all plus majority vote
    let results = reflector.reflect_all(&oracles, &request).await?;
    println!("all answers: {results:?}");
    if let Some(majority) = consensus(&results) {
        println!("consensus: {majority}");
    }

    Ok(())
}
