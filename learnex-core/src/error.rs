//! Unified error handling system
//!
//! Structured error types with context and recovery suggestions for loading
//! and validating configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

pub type LearnexResult<T> = Result<T, LearnexError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Configuration failures
#[derive(Error, Debug)]
pub enum LearnexError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },
}

impl LearnexError {
    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            LearnexError::Config { context, .. } => context,
            LearnexError::Validation { context, .. } => context,
        }
    }

    /// Log the error with its tracking id and suggestions
    pub fn log(&self) {
        let context = self.context();
        error!(
            error_id = %context.error_id,
            component = %context.component,
            suggestions = ?context.recovery_suggestions,
            error = %self,
            "Configuration rejected"
        );
    }
}

/// Config error wrapping an underlying failure
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $source:expr, $operation:expr, $suggestion:expr) => {
        $crate::LearnexError::Config {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new("config")
                .with_operation($operation)
                .with_suggestion($suggestion),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::LearnexError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}
