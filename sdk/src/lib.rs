//! EcoAgent SDK
//!
//! Shared library providing the capability contract and error types.
//! This crate is used by the engine and by anything that registers capabilities.

/// Capability trait
pub mod capability;

/// Error types and handling
pub mod errors;

/// Capability argument and error types
pub mod types;

// Re-export commonly used types
pub use capability::Capability;
pub use errors::{AgentErrorExt, EngineError};
pub use types::{CapabilityArgs, CapabilityError};
