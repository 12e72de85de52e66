//! Capability input/error types

use serde::{Deserialize, Serialize};

/// Positional arguments passed to a capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityArgs(Vec<String>);

impl CapabilityArgs {
    /// Create a new argument list
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    /// Create an empty argument list
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Get a required argument by position
    ///
    /// Blank values count as missing.
    pub fn required(&self, index: usize, name: &str) -> Result<&str, CapabilityError> {
        self.optional(index)
            .ok_or_else(|| CapabilityError::MissingArgument(name.to_string()))
    }

    /// Get an optional argument by position, trimmed
    pub fn optional(&self, index: usize) -> Option<&str> {
        self.0
            .get(index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for CapabilityArgs {
    fn from(args: Vec<String>) -> Self {
        Self(args)
    }
}

/// Capability-specific errors
///
/// The message is what the user sees, so it must name the offending value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Falta el argumento requerido: {0}")]
    MissingArgument(String),

    #[error("Error interno: {0}")]
    Internal(String),
}
