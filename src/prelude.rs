//! Convenient re-exports for common throttling types.
pub use crate::{
    condition::Condition,
    config::{RateRule, ThrottleConfig},
    context::CancelContext,
    defaults::default_config,
    error::{ConfigError, ThrottleError, ThrottleServiceError},
    layer::{ThrottleLayer, ThrottleService},
    pipeline::{HandlerList, Handlers, NamedHandler},
    request::{Request, RequestDescriptor},
    throttler::{Throttler, ThrottlerBuilder},
};
