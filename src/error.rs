use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "resilience.burst", "jobs.valuation")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "scheduler", "rate_limiter")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the pipeline runtime.
///
/// Breaker rejections and remote failures get their own variants so callers can
/// branch on the kind of failure instead of matching on messages.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    /// The circuit breaker guarding `resource` rejected the call without invoking it.
    #[error("Circuit breaker open for '{resource}' (retry in {retry_in_ms} ms)")]
    CircuitOpen { resource: String, retry_in_ms: u64 },

    #[error("Remote error: HTTP {status}: {message}")]
    Remote {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Shorthand for a runtime error without context.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::runtime_with_context(msg, ErrorContext::new())
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True when a circuit breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen { .. })
    }

    /// Whether a retry policy may re-invoke the failed operation.
    ///
    /// Breaker rejections and programming errors (bad configuration, invalid
    /// input) surface immediately; transport, I/O and runtime failures are
    /// treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::CircuitOpen { .. } | Error::Configuration { .. } | Error::Validation { .. } => {
                false
            }
            Error::Remote { retryable, .. } => *retryable,
            Error::Serialization(_) | Error::Yaml(_) => false,
            Error::Runtime { .. } | Error::Transport(_) | Error::Io(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_rendered_in_display() {
        let err = Error::configuration_with_context(
            "burst must be positive",
            ErrorContext::new()
                .with_field_path("resilience.burst")
                .with_source("settings"),
        );
        assert_eq!(
            err.to_string(),
            "Configuration error: burst must be positive (field: resilience.burst, source: settings)"
        );
    }

    #[test]
    fn test_circuit_open_is_not_retryable() {
        let err = Error::CircuitOpen {
            resource: "whois".into(),
            retry_in_ms: 500,
        };
        assert!(err.is_circuit_open());
        assert!(!err.is_retryable());
        assert!(err.context().is_none());
    }

    #[test]
    fn test_remote_retryability_follows_flag() {
        let throttled = Error::Remote {
            status: 429,
            message: "slow down".into(),
            retryable: true,
        };
        let missing = Error::Remote {
            status: 404,
            message: "no such domain".into(),
            retryable: false,
        };
        assert!(throttled.is_retryable());
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_runtime_errors_are_transient() {
        assert!(Error::runtime("connection reset").is_retryable());
    }
}
