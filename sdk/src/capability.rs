//! Capability trait
//!
//! A capability is a named unit of business logic the orchestrator can invoke.
//! Capabilities never panic on bad input: validation failures come back as
//! `CapabilityError` values carrying a descriptive, user-facing message.

use async_trait::async_trait;

use crate::types::{CapabilityArgs, CapabilityError};

/// Trait that all capabilities must implement
#[async_trait]
pub trait Capability: Send + Sync {
    /// Stable identifier used for dispatch
    fn name(&self) -> &str;

    /// One-line description shown to the reasoning step
    fn description(&self) -> &str;

    /// Positional parameter names, e.g. `["product_id", "purchase_date"]`
    fn params(&self) -> &[&'static str];

    /// Invoke the capability
    async fn invoke(&self, args: &CapabilityArgs) -> Result<String, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Capability for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Repeats its first argument"
        }

        fn params(&self) -> &[&'static str] {
            &["text"]
        }

        async fn invoke(&self, args: &CapabilityArgs) -> Result<String, CapabilityError> {
            Ok(args.required(0, "text")?.to_string())
        }
    }

    #[tokio::test]
    async fn test_capability_object_safety() {
        let cap: Box<dyn Capability> = Box::new(Echo);
        assert_eq!(cap.name(), "echo");
        let out = cap.invoke(&CapabilityArgs::new(["hola"])).await.unwrap();
        assert_eq!(out, "hola");
        assert!(cap.invoke(&CapabilityArgs::empty()).await.is_err());
    }
}
