use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "cache.similarity_threshold")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "persister", "embedding_provider")
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

/// Unified error type for the client core.
///
/// Transient network failures never surface directly: the transport retries them and
/// reports [`Error::TransportFailed`] only after the retry budget is spent.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Rate limit exceeded: cancelled while waiting for a request token")]
    RateLimitExceeded,

    #[error("Transport failed after {attempts} attempt(s): {last}")]
    TransportFailed {
        attempts: u32,
        #[source]
        last: TransportError,
    },

    #[error("Request failed: HTTP {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Response could not be parsed: {0}")]
    ResponseUnparsable(#[source] serde_json::Error),

    #[error("Embedding failed: {message}{}", format_context(.context))]
    EmbeddingFailed {
        message: String,
        context: ErrorContext,
    },

    #[error("Persistence error: {message}{}", format_context(.context))]
    Persistence {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
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
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::embedding_with_context(msg, ErrorContext::new())
    }

    pub fn embedding_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::EmbeddingFailed {
            message: msg.into(),
            context,
        }
    }

    pub fn persistence_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Persistence {
            message: msg.into(),
            context,
        }
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// True for the two cancellation flavours (caller context or limiter wait).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled | Error::RateLimitExceeded)
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::EmbeddingFailed { context, .. }
            | Error::Persistence { context, .. }
            | Error::Configuration { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_rendered_in_display() {
        let err = Error::configuration_with_context(
            "threshold out of range",
            ErrorContext::new()
                .with_field_path("cache.similarity_threshold")
                .with_details("got 1.5"),
        );
        let text = err.to_string();
        assert!(text.contains("threshold out of range"));
        assert!(text.contains("field: cache.similarity_threshold"));
        assert!(text.contains("details: got 1.5"));
    }

    #[test]
    fn test_empty_context_renders_nothing() {
        let err = Error::embedding("provider unavailable");
        assert_eq!(err.to_string(), "Embedding failed: provider unavailable");
        assert!(err.context().is_some());
    }

    #[test]
    fn test_transport_failed_keeps_last_error_as_source() {
        let err = Error::TransportFailed {
            attempts: 4,
            last: TransportError::RetryableStatus { status: 503 },
        };
        assert!(err.to_string().contains("4 attempt(s)"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Retryable status: HTTP 503"));
    }

    #[test]
    fn test_cancellation_flavours() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(Error::RateLimitExceeded.is_cancelled());
        assert!(!Error::embedding("x").is_cancelled());
    }
}
