//! Integration tests for learnex-core infrastructure

use learnex_core::{validation_error, ErrorContext, LearnexConfig, LearnexError, Role};

#[test]
fn test_error_handling() {
    let validation = validation_error!("bad port", "server.port", "test");
    match &validation {
        LearnexError::Validation { field, context, .. } => {
            assert_eq!(field.as_deref(), Some("server.port"));
            assert_eq!(context.component, "test");
            assert!(!context.error_id.is_empty());
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected Validation error"),
    }

    // Logging without a subscriber must not panic
    validation.log();
}

#[test]
fn test_error_context_builder() {
    let context = ErrorContext::new("auth")
        .with_operation("login")
        .with_suggestion("Retry");

    assert_eq!(context.operation.as_deref(), Some("login"));
    assert_eq!(context.recovery_suggestions, vec!["Retry".to_string()]);
}

#[test]
fn test_missing_config_file() {
    let result = LearnexConfig::from_file("/definitely/not/here/learnex.toml");
    match result {
        Err(err @ LearnexError::Config { .. }) => {
            assert_eq!(err.context().operation.as_deref(), Some("read_file"));
            assert!(std::error::Error::source(&err).is_some());
        }
        other => panic!("Expected Config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("learnex.toml");
    std::fs::write(&path, "[session]\ntimeout_secs = 0\n").unwrap();

    let result = LearnexConfig::from_file(&path);
    assert!(matches!(result, Err(LearnexError::Validation { .. })));
}

#[test]
fn test_access_rules_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("learnex.toml");
    std::fs::write(
        &path,
        r#"
[access.rules]
grades = ["teacher", "student"]
users = ["admin"]
"#,
    )
    .unwrap();

    let config = LearnexConfig::from_file(&path).unwrap();
    assert_eq!(config.access.rules["grades"], vec![Role::Teacher, Role::Student]);
    assert_eq!(config.access.rules["users"], vec![Role::Admin]);
}
