//! Core traits for the reflector system
//!
//! This module defines the abstract interfaces that transport
//! implementations must follow.
//!
//! - [`OracleClient`]: query one oracle for the externally visible address

pub mod oracle_client;

pub use oracle_client::OracleClient;
