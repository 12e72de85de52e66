//! Error types and handling
//!
//! This module provides the error types used throughout the EcoAgent engine.
//! All errors implement the `AgentErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Recovery model
//!
//! Most failures never reach the caller as a hard error:
//! - **BackendUnavailable**: recovered locally by switching to the rule-based strategy
//! - **CapabilityNotFound**: recovered by re-prompting within the iteration budget
//! - **InvalidArgument**: surfaced as a descriptive text answer with `status = error`
//!
//! Only configuration and I/O problems at startup are fatal.

use thiserror::Error;

/// Trait for engine error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait AgentErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// API keys or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors are handled inside the query loop. Non-recoverable
    /// errors stop the engine from starting.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Examples
///
/// ```
/// use sdk::errors::{AgentErrorExt, EngineError};
///
/// let error = EngineError::CapabilityNotFound("send_fax".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("max_iterations must be >= 1".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Model / embedding backend errors
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("LLM call timed out")]
    LLMTimeout,

    // Capability errors
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::BackendUnavailable(_) => {
                "Language model unavailable. Answers come from the built-in rules"
            }
            Self::LLMTimeout => "The language model took too long to respond. Try again",
            Self::CapabilityNotFound(_) => "The requested tool is not available",
            Self::InvalidArgument(_) => "Check the product id, customer id or date format",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Serialization(_) => "Failed to encode or decode data",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Io(_) => false,
            _ => true,
        }
    }
}
