//! # Processing Error Types
//!
//! Structured error handling for the document-processing core using thiserror
//! for typed errors instead of `Box<dyn Error>` patterns.
//!
//! Two layers are distinguished deliberately:
//! - [`ProviderError`] is what an external dependency (OCR service, blob
//!   storage, document database) reports about its own failure.
//! - [`ProcessingError`] is what this crate reports to callers, including
//!   failures this crate itself decided on (short-circuits, cancellation,
//!   invalid configuration) with provider causes attached as sources.
//!
//! A cache miss is intentionally not an error: the cache API models absence
//! with `Option` and callers fall through to the real operation.

use thiserror::Error;

/// Failure reported by an external dependency of the document pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Quota exhausted: {message}")]
    QuotaExhausted { message: String },

    #[error("Provider call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Provider unavailable: {message}")]
    Unavailable { message: String },
}

impl ProviderError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a quota exhausted error
    pub fn quota_exhausted(message: impl Into<String>) -> Self {
        Self::QuotaExhausted {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed without operator intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Unavailable { .. }
        )
    }
}

/// Errors surfaced by the document-processing core.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The failure context for this dependency has tripped; the call was
    /// rejected without being attempted.
    #[error("Circuit open for context: {context}")]
    CircuitOpen { context: String },

    /// The external dependency was invoked and failed.
    #[error("Operation '{operation}' failed: {source}")]
    Provider {
        operation: String,
        #[source]
        source: ProviderError,
    },

    /// The batch was cancelled before or while this operation ran.
    #[error("Operation '{operation}' cancelled")]
    Cancelled { operation: String },

    /// Invalid parameters; nothing was executed.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Invariant violation inside the core itself, such as a panicked
    /// operation task.
    #[error("Internal processing error: {message}")]
    Internal { message: String },
}

impl ProcessingError {
    /// Create a circuit open error
    pub fn circuit_open(context: impl Into<String>) -> Self {
        Self::CircuitOpen {
            context: context.into(),
        }
    }

    /// Create a provider failure error
    pub fn provider(operation: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            operation: operation.into(),
            source,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when the operation was rejected by a tripped failure context.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// True when the operation ended because its batch was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The provider-reported cause, when one exists.
    pub fn provider_cause(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for document-processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_creation() {
        let transport = ProviderError::transport("connection reset");
        assert!(matches!(transport, ProviderError::Transport { .. }));

        let timeout = ProviderError::timeout(5000);
        assert!(matches!(
            timeout,
            ProviderError::Timeout { timeout_ms: 5000 }
        ));

        let quota = ProviderError::quota_exhausted("daily limit reached");
        assert!(matches!(quota, ProviderError::QuotaExhausted { .. }));
    }

    #[test]
    fn test_provider_error_transience() {
        assert!(ProviderError::transport("reset").is_transient());
        assert!(ProviderError::timeout(100).is_transient());
        assert!(ProviderError::unavailable("503").is_transient());
        assert!(!ProviderError::authentication("bad key").is_transient());
        assert!(!ProviderError::quota_exhausted("over limit").is_transient());
    }

    #[test]
    fn test_processing_error_creation() {
        let open = ProcessingError::circuit_open("ocr");
        assert!(open.is_circuit_open());
        assert!(!open.is_cancelled());

        let cancelled = ProcessingError::cancelled("extract_text");
        assert!(cancelled.is_cancelled());

        let failed =
            ProcessingError::provider("upload_image", ProviderError::transport("broken pipe"));
        assert!(matches!(failed, ProcessingError::Provider { .. }));
        assert_eq!(
            failed.provider_cause(),
            Some(&ProviderError::transport("broken pipe"))
        );
    }

    #[test]
    fn test_error_display_formatting() {
        let open = ProcessingError::circuit_open("storage");
        assert_eq!(open.to_string(), "Circuit open for context: storage");

        let failed = ProcessingError::provider("extract_text", ProviderError::timeout(30000));
        assert!(failed.to_string().contains("extract_text"));

        let config = ProcessingError::configuration("concurrency limit must be at least 1");
        assert!(config.to_string().contains("concurrency limit"));
    }
}
