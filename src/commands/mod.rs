//! Command implementations for the CLI
//!
//! This module contains the implementation of all CLI commands:
//! - start: Start the agent server
//! - test: Test configuration validity
//! - config: Configuration display
//! - cost: Price a usage object offline
//! - peers: List peer agents from the registry

pub mod config;
pub mod cost;
pub mod peers;
pub mod start;
pub mod test;
