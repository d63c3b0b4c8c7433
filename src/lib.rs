#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Throttle Gate
//!
//! Client-side throttling for outbound API calls. Every request is checked against a list of
//! conditions keyed on its service id and operation name; each matching condition owns a token
//! bucket, and the request waits on each of them before it is signed and sent.
//!
//! ## Features
//!
//! - **Conditions** by service, exact operation, or operation-name regex
//! - **Token buckets** with fractional rates, shared by all concurrent callers
//! - **Override grammar** `serviceID:operationRegex=rate:burst` for per-service tuning
//! - **Cancellation** through a per-request [`CancelContext`] with optional deadline
//! - **Pipeline hooks** ([`pipeline::Handlers`]) and a tower [`ThrottleLayer`]
//!
//! ## Quick Start
//!
//! ```rust
//! use throttle_gate::{pipeline::Handlers, Request, ThrottleConfig, Throttler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = ThrottleConfig::default();
//!     config.apply_overrides("ECR:.*=10:1").expect("valid overrides");
//!
//!     let mut handlers = Handlers::new();
//!     Throttler::from_config(&config).inject_handlers(&mut handlers);
//!
//!     let mut req = Request::new("ECR").with_operation("DescribeRepositories");
//!     handlers.dispatch(&mut req).await.expect("not cancelled");
//! }
//! ```

pub mod condition;
pub mod config;
pub mod context;
pub mod defaults;
pub mod error;
pub mod layer;
pub mod limiter;
pub mod pipeline;
pub mod prelude;
pub mod request;
pub mod throttler;

// Re-exports
pub use condition::Condition;
pub use config::{RateRule, ThrottleConfig};
pub use context::CancelContext;
pub use error::{BoxError, ConfigError, ThrottleError, ThrottleServiceError};
pub use layer::{ThrottleLayer, ThrottleService};
pub use limiter::Limiter;
pub use request::{Operation, Request, RequestDescriptor};
pub use throttler::{Throttler, ThrottlerBuilder, HANDLER_NAME};
