// # reflector-core
//
// Core library for the oracle-racing external-address reflector.
//
// ## Architecture Overview
//
// This library provides the engine that discovers the host's externally
// visible IP address by racing independent third-party "address oracles":
// - **OracleDescriptor / OracleSet**: immutable endpoint records and the
//   ordered, endpoint-deduplicated collection the caller supplies
// - **OracleClient**: trait for transport implementations (TLS-HTTP and
//   STUN live in sibling crates)
// - **Reflector**: race orchestrator with first-success and collect-all
//   modes, per-query deadlines and caller cancellation
// - **consensus**: pure majority vote over collected results
// - **OracleRegistry**: per-transport client lookup plus the built-in
//   oracle table
//
// ## Design Principles
//
// 1. **Separation of Concerns**: transports are plugged in behind a trait;
//    the engine owns all racing and timeout policy
// 2. **Skip-and-Continue**: a failing oracle degrades its own contribution,
//    never the overall call
// 3. **Library-First**: the daemon is a thin wrapper; everything here is
//    usable embedded
// 4. **Exclusive Ownership**: each in-flight query owns its socket; the
//    only cross-task state is the race's completion channel

pub mod config;
pub mod consensus;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod parse;
pub mod registry;
pub mod traits;
pub mod wildcard;

// Re-export core types for convenience
pub use config::{OracleConfig, ReflectMode, ReflectorConfig};
pub use consensus::consensus;
pub use engine::{ReflectEvent, ReflectionRequest, Reflector};
pub use error::{Error, Result};
pub use oracle::{IpFamily, OracleDescriptor, OracleSet, Transport};
pub use registry::OracleRegistry;
pub use traits::OracleClient;
