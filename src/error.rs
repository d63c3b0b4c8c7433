//! Error types for configuration parsing and request gating

use std::fmt;

/// Boxed error returned by pipeline hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Malformed throttle override string.
///
/// Every variant carries the fragment that failed so operators can find it in a long flag value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The entry did not split into exactly two parts on `=`.
    #[error("{0} must be formatted as serviceID:operationRegex=rate:burst")]
    Entry(String),
    /// The left side did not split into exactly two parts on `:`.
    #[error("{0} must be formatted as serviceID:operationRegex")]
    ServiceOperation(String),
    /// The right side did not split into exactly two parts on `:`.
    #[error("{0} must be formatted as rate:burst")]
    RateBurst(String),
    /// The service identifier was empty.
    #[error("{0} must name a non-empty serviceID")]
    EmptyServiceId(String),
    /// The operation pattern failed to compile.
    #[error("{fragment} must be valid regex expression for operation: {reason}")]
    InvalidPattern { fragment: String, reason: String },
    /// The rate was not a non-negative float.
    #[error("{0} must be valid float number as rate for operations per second")]
    InvalidRate(String),
    /// The burst was not a positive integer.
    #[error("{0} must be valid integer as burst for operations")]
    InvalidBurst(String),
}

impl ConfigError {
    /// The offending fragment of the override string.
    pub fn fragment(&self) -> &str {
        match self {
            Self::Entry(s)
            | Self::ServiceOperation(s)
            | Self::RateBurst(s)
            | Self::EmptyServiceId(s)
            | Self::InvalidRate(s)
            | Self::InvalidBurst(s) => s,
            Self::InvalidPattern { fragment, .. } => fragment,
        }
    }
}

/// Failure raised while a request waits at the throttle gate.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleError {
    /// The request's context was cancelled before a token was granted.
    #[error("request cancelled while waiting for throttle")]
    Cancelled,
    /// The request's deadline passed, or would pass, before a token was granted.
    #[error("request deadline exceeded while waiting for throttle")]
    DeadlineExceeded,
}

impl ThrottleError {
    /// Check if this error is due to explicit cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error is due to the deadline.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }
}

/// Error produced by [`ThrottleService`](crate::layer::ThrottleService).
#[derive(Debug)]
pub enum ThrottleServiceError<E> {
    /// The gate rejected the request before it reached the inner service.
    Throttle(ThrottleError),
    /// The inner service failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for ThrottleServiceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttle(e) => write!(f, "{}", e),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ThrottleServiceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Throttle(e) => Some(e),
            Self::Inner(e) => Some(e),
        }
    }
}

impl<E> From<ThrottleError> for ThrottleServiceError<E> {
    fn from(err: ThrottleError) -> Self {
        Self::Throttle(err)
    }
}

impl<E> ThrottleServiceError<E> {
    /// Check if the gate rejected the request.
    pub fn is_throttle(&self) -> bool {
        matches!(self, Self::Throttle(_))
    }

    /// Borrow the gate error if present.
    pub fn as_throttle(&self) -> Option<&ThrottleError> {
        match self {
            Self::Throttle(e) => Some(e),
            _ => None,
        }
    }

    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}
