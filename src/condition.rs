//! Predicates deciding which requests a limiter applies to.
//!
//! Operation-scoped conditions never match a request without an operation name. Pattern
//! conditions use unanchored regex search, so `^Describe|List` matches `DescribeMesh` and any
//! name containing `List`.

use crate::request::RequestDescriptor;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&str, Option<&str>) -> bool + Send + Sync>;

/// Match rule over `(service id, operation name)`.
#[derive(Clone)]
pub enum Condition {
    /// Every request to the service.
    Service { service_id: String },
    /// Requests to the service for exactly this operation.
    Operation { service_id: String, operation: String },
    /// Requests to the service whose operation name contains a match of `pattern`.
    OperationPattern { service_id: String, pattern: Regex },
    /// Caller-supplied predicate.
    Custom(Predicate),
}

impl Condition {
    pub fn service(service_id: impl Into<String>) -> Self {
        Self::Service { service_id: service_id.into() }
    }

    pub fn operation(service_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Operation { service_id: service_id.into(), operation: operation.into() }
    }

    pub fn operation_pattern(service_id: impl Into<String>, pattern: Regex) -> Self {
        Self::OperationPattern { service_id: service_id.into(), pattern }
    }

    /// Wrap an arbitrary predicate over `(service id, operation name)`.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    /// Evaluate against a request descriptor.
    pub fn matches<R: RequestDescriptor + ?Sized>(&self, req: &R) -> bool {
        self.matches_parts(req.service_id(), req.operation_name())
    }

    /// Evaluate against raw descriptor fields.
    pub fn matches_parts(&self, service_id: &str, operation: Option<&str>) -> bool {
        match self {
            Self::Service { service_id: want } => want == service_id,
            Self::Operation { service_id: want, operation: want_op } => {
                matches!(operation, Some(op) if want == service_id && op == want_op)
            }
            Self::OperationPattern { service_id: want, pattern } => {
                matches!(operation, Some(op) if want == service_id && pattern.is_match(op))
            }
            Self::Custom(predicate) => predicate(service_id, operation),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service { service_id } => write!(f, "{}", service_id),
            Self::Operation { service_id, operation } => write!(f, "{}:{}", service_id, operation),
            Self::OperationPattern { service_id, pattern } => {
                write!(f, "{}:/{}/", service_id, pattern.as_str())
            }
            Self::Custom(_) => f.write_str("<custom>"),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service { service_id } => {
                f.debug_struct("Service").field("service_id", service_id).finish()
            }
            Self::Operation { service_id, operation } => f
                .debug_struct("Operation")
                .field("service_id", service_id)
                .field("operation", operation)
                .finish(),
            Self::OperationPattern { service_id, pattern } => f
                .debug_struct("OperationPattern")
                .field("service_id", service_id)
                .field("pattern", &pattern.as_str())
                .finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<predicate>").finish(),
        }
    }
}
