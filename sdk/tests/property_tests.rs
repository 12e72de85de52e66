use proptest::prelude::*;
use sdk::errors::{AgentErrorExt, EngineError};
use sdk::{CapabilityArgs, CapabilityError};

// Every error variant yields a non-empty, static user hint
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "\\PC*") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::BackendUnavailable(error_str.clone()),
            EngineError::LLMTimeout,
            EngineError::CapabilityNotFound(error_str.clone()),
            EngineError::InvalidArgument(error_str.clone()),
            EngineError::Network(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains("sk-"));
        }
    }

    #[test]
    fn test_only_config_and_io_are_fatal(msg in "[a-z ]{0,20}") {
        prop_assert!(!EngineError::Config(msg.clone()).is_recoverable());
        prop_assert!(EngineError::BackendUnavailable(msg.clone()).is_recoverable());
        prop_assert!(EngineError::CapabilityNotFound(msg.clone()).is_recoverable());
        prop_assert!(EngineError::InvalidArgument(msg).is_recoverable());
    }

    #[test]
    fn test_blank_arguments_are_missing(padding in "[ \\t]{0,6}", index in 0usize..3) {
        let args = CapabilityArgs::new(vec![padding.clone(); 3]);
        prop_assert_eq!(args.optional(index), None);
        prop_assert_eq!(
            args.required(index, "product_id"),
            Err(CapabilityError::MissingArgument("product_id".to_string()))
        );
    }

    #[test]
    fn test_arguments_are_trimmed(value in "[A-Z0-9]{1,10}", pad in "[ ]{0,4}") {
        let args = CapabilityArgs::new([format!("{pad}{value}{pad}")]);
        prop_assert_eq!(args.required(0, "x").unwrap(), value.as_str());
    }
}
