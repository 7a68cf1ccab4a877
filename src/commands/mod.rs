//! Command implementations for the CLI
//!
//! - server: run the storage server
//! - agent: run the collector agent
//! - test: validate configuration and print a summary

pub mod agent;
pub mod server;
pub mod test;
