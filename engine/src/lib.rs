//! EcoAgent Engine Library
//!
//! This library provides the query-resolution core of EcoAgent.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Injectable clock
pub mod clock;

/// Completion backend abstraction and reply protocol
pub mod llm;

/// Document corpus and ranking
pub mod retrieval;

/// Answer synthesis from retrieved documents
pub mod synthesis;

/// Capability registry and business-rule capabilities
pub mod tools;

/// Agent loop core module
pub mod agent;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

pub use agent::{Orchestrator, QueryResponse, QueryStatus, StatsReport, TerminalState};
pub use config::Config;
