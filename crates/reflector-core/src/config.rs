//! Configuration types for the reflector system
//!
//! This module defines the configuration structures consumed by
//! embedders and the daemon.

use serde::{Deserialize, Serialize};

use crate::oracle::{IpFamily, OracleDescriptor, OracleSet};

/// Main reflector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectorConfig {
    /// Oracles to query, in preference order
    pub oracles: Vec<OracleConfig>,

    /// Address family to discover
    pub family: IpFamily,

    /// Per-query deadline in seconds (None = caller cancellation only)
    #[serde(default)]
    pub per_query_timeout_secs: Option<u64>,

    /// How the race resolves its answer
    #[serde(default)]
    pub mode: ReflectMode,
}

impl ReflectorConfig {
    /// Create a configuration over the given oracles with defaults
    pub fn new(oracles: Vec<OracleConfig>, family: IpFamily) -> Self {
        Self {
            oracles,
            family,
            per_query_timeout_secs: None,
            mode: ReflectMode::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.oracles.is_empty() {
            return Err(crate::Error::invalid_input("no oracles configured"));
        }

        if let Some(timeout) = self.per_query_timeout_secs
            && !(1..=300).contains(&timeout)
        {
            return Err(crate::Error::invalid_input(format!(
                "per_query_timeout_secs must be between 1 and 300, got {timeout}"
            )));
        }

        // Descriptor construction re-checks each endpoint; duplicates
        // are rejected here rather than silently dropped.
        self.oracle_set().map(|_| ())
    }

    /// Build the ordered oracle set described by this configuration
    ///
    /// Fails on an unparseable endpoint, an unsupported scheme, or a
    /// duplicate endpoint.
    pub fn oracle_set(&self) -> Result<OracleSet, crate::Error> {
        let mut set = OracleSet::new();
        for oracle in &self.oracles {
            let descriptor = OracleDescriptor::parse(&oracle.id, &oracle.url)?;
            if !set.push(descriptor) {
                return Err(crate::Error::invalid_input(format!(
                    "duplicate oracle endpoint: {}",
                    oracle.url
                )));
            }
        }
        Ok(set)
    }
}

/// One configured oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Identity used to key results (e.g. "ipify")
    pub id: String,

    /// Endpoint URL; the scheme selects the transport
    pub url: String,
}

impl OracleConfig {
    /// Create an oracle entry
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// How a reflection run resolves its answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectMode {
    /// First successful oracle wins
    #[default]
    First,

    /// Collect every answer and take the majority vote
    Consensus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(urls: &[(&str, &str)]) -> ReflectorConfig {
        ReflectorConfig::new(
            urls.iter().map(|(id, url)| OracleConfig::new(*id, *url)).collect(),
            IpFamily::V4,
        )
    }

    #[test]
    fn valid_config_passes() {
        let cfg = config(&[
            ("ipify", "https://api.ipify.org"),
            ("google", "stun://stun.l.google.com:19302"),
        ]);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.oracle_set().unwrap().len(), 2);
    }

    #[test]
    fn empty_oracles_rejected() {
        let cfg = config(&[]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn duplicate_endpoint_rejected() {
        let cfg = config(&[
            ("a", "https://api.ipify.org"),
            ("b", "https://api.ipify.org"),
        ]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn timeout_range_enforced() {
        let mut cfg = config(&[("ipify", "https://api.ipify.org")]);
        cfg.per_query_timeout_secs = Some(0);
        assert!(cfg.validate().is_err());
        cfg.per_query_timeout_secs = Some(5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn mode_defaults_to_first() {
        let cfg = config(&[("ipify", "https://api.ipify.org")]);
        assert_eq!(cfg.mode, ReflectMode::First);
    }
}
