//! Domain error types for typed error handling.
//!
//! Every fallible operation in the engine surfaces one of these variants.
//! Transport detail is preserved as a source for logging but kept out of
//! the domain-facing message.

/// Result type for drive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Drive errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed or missing input, or an oversize payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Caller-declared content hash does not match the computed hash.
    #[error("integrity check failed: declared hash {declared} does not match computed {computed}")]
    Integrity { declared: String, computed: String },

    /// Accepting the payload would exceed the account's storage cap.
    #[error("storage quota exceeded: {used} + {candidate} bytes over {cap} byte cap")]
    QuotaExceeded { used: u64, candidate: u64, cap: u64 },

    /// No repository (or branch) is bound for the account.
    #[error("repository not configured: {0}")]
    NotConfigured(String),

    /// Branch reference kept moving during commit and retries were exhausted.
    #[error("commit conflict on {repo} after {attempts} attempts")]
    Conflict { repo: String, attempts: u32 },

    /// Backing-store communication failure.
    #[error("backing store transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Referenced object or path is absent.
    #[error("not found: {path}")]
    NotFound { path: String },
}

impl Error {
    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Create a not-configured error.
    pub fn not_configured(reason: impl Into<String>) -> Self {
        Self::NotConfigured(reason.into())
    }

    /// Create a transport error without an underlying source.
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping an underlying cause.
    pub fn transport_with(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }
}

/// Convert drive errors to HTTP status codes for boundary consumers.
impl Error {
    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_)
            | Self::Integrity { .. }
            | Self::QuotaExceeded { .. }
            | Self::NotConfigured(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Transport { .. } => 502,
        }
    }
}
