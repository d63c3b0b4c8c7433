//! Request throttler: conditions paired with shared token buckets.
//!
//! Semantics:
//! - Pairs are evaluated in registration order and **every** matching pair applies.
//! - Matching waits run one after another, so a request held by two empty buckets waits for the
//!   sum of both refills, not the longer of the two.
//! - A failed wait returns immediately; tokens already taken from earlier buckets stay spent and
//!   later buckets are never touched.
//! - Requests matching nothing pass straight through.
//!
//! Example
//! ```rust
//! use throttle_gate::{Request, ThrottleConfig, Throttler};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut config = ThrottleConfig::default();
//! config.apply_overrides("ECR:^Describe|List=100:10").unwrap();
//! let throttler = Throttler::builder()
//!     .with_config(&config)
//!     .with_service_throttle("ApiGatewayV2", 50.0, 10)
//!     .build();
//!
//! let req = Request::new("ECR").with_operation("ListImages");
//! throttler.gate(&req).await.unwrap();
//! # });
//! ```

use crate::condition::Condition;
use crate::config::ThrottleConfig;
use crate::error::{BoxError, ThrottleError};
use crate::limiter::Limiter;
use crate::pipeline::{Handlers, NamedHandler};
use crate::request::{Request, RequestDescriptor};
use futures::FutureExt;
use regex::Regex;
use std::sync::Arc;
use tokio::time::Instant;

/// Name under which the gate is registered in a [`Handlers`] pipeline.
pub const HANDLER_NAME: &str = "requestThrottle";

#[derive(Debug)]
struct ConditionLimiter {
    condition: Condition,
    limiter: Limiter,
}

/// Gate shared by every request of a client. Cloning shares the same buckets.
#[derive(Debug, Clone)]
pub struct Throttler {
    pairs: Arc<[ConditionLimiter]>,
}

impl Throttler {
    /// Construct a builder with no rules.
    pub fn builder() -> ThrottlerBuilder {
        ThrottlerBuilder::new()
    }

    /// One pattern condition and bucket per rule, services in ascending order.
    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self::builder().with_config(config).build()
    }

    /// Number of condition/bucket pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// How many pairs would gate `req`.
    pub fn matching<R: RequestDescriptor + ?Sized>(&self, req: &R) -> usize {
        self.pairs.iter().filter(|pair| pair.condition.matches(req)).count()
    }

    /// Wait on every matching bucket in turn, or fail when the request context is done.
    pub async fn gate<R: RequestDescriptor + ?Sized>(&self, req: &R) -> Result<(), ThrottleError> {
        for pair in self.pairs.iter() {
            if !pair.condition.matches(req) {
                continue;
            }
            let started = Instant::now();
            if let Err(err) = pair.limiter.wait(req.context()).await {
                tracing::debug!(
                    service = req.service_id(),
                    operation = req.operation_name().unwrap_or_default(),
                    condition = %pair.condition,
                    error = %err,
                    "throttle wait abandoned"
                );
                return Err(err);
            }
            let waited = started.elapsed();
            if !waited.is_zero() {
                tracing::debug!(
                    service = req.service_id(),
                    operation = req.operation_name().unwrap_or_default(),
                    condition = %pair.condition,
                    waited_ms = waited.as_millis() as u64,
                    "request throttled"
                );
            }
        }
        Ok(())
    }

    /// Register the gate at the front of the sign phase so it runs before signing.
    pub fn inject_handlers(&self, handlers: &mut Handlers) {
        let throttler = self.clone();
        handlers.sign.push_front_named(NamedHandler::new(HANDLER_NAME, move |req: &mut Request| {
            let throttler = throttler.clone();
            async move { throttler.gate(&*req).await.map_err(BoxError::from) }.boxed()
        }));
    }
}

/// Builder appending condition/bucket pairs in order.
#[derive(Debug, Default)]
pub struct ThrottlerBuilder {
    pairs: Vec<ConditionLimiter>,
}

impl ThrottlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate requests matching `condition` at `rate` per second with `burst` capacity.
    pub fn with_condition_throttle(mut self, condition: Condition, rate: f64, burst: u32) -> Self {
        self.pairs.push(ConditionLimiter { condition, limiter: Limiter::new(rate, burst) });
        self
    }

    /// Gate every request to a service.
    pub fn with_service_throttle(
        self,
        service_id: impl Into<String>,
        rate: f64,
        burst: u32,
    ) -> Self {
        self.with_condition_throttle(Condition::service(service_id), rate, burst)
    }

    /// Gate one operation of a service.
    pub fn with_operation_throttle(
        self,
        service_id: impl Into<String>,
        operation: impl Into<String>,
        rate: f64,
        burst: u32,
    ) -> Self {
        self.with_condition_throttle(Condition::operation(service_id, operation), rate, burst)
    }

    /// Gate the operations of a service whose names match `pattern`.
    pub fn with_operation_pattern_throttle(
        self,
        service_id: impl Into<String>,
        pattern: Regex,
        rate: f64,
        burst: u32,
    ) -> Self {
        self.with_condition_throttle(Condition::operation_pattern(service_id, pattern), rate, burst)
    }

    /// Append one pattern throttle per configured rule.
    pub fn with_config(self, config: &ThrottleConfig) -> Self {
        config.iter().fold(self, |builder, (service_id, rules)| {
            rules.iter().fold(builder, |builder, rule| {
                builder.with_operation_pattern_throttle(
                    service_id,
                    rule.pattern().clone(),
                    rule.rate(),
                    rule.burst(),
                )
            })
        })
    }

    pub fn build(self) -> Throttler {
        Throttler { pairs: self.pairs.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn from_config_flattens_rules_in_service_order() {
        let config: ThrottleConfig = "svcB:^Get=1:1,svcA:^Get=1:1,svcA:^Put=1:1".parse().unwrap();
        let throttler = Throttler::from_config(&config);
        assert_eq!(throttler.len(), 3);
        let rendered: Vec<String> = throttler.pairs.iter().map(|p| p.condition.to_string()).collect();
        assert_eq!(rendered, vec!["svcA:/^Get/", "svcA:/^Put/", "svcB:/^Get/"]);
    }

    #[test]
    fn builder_appends_after_config_rules() {
        let throttler = Throttler::builder()
            .with_config(&ThrottleConfig::default())
            .with_service_throttle("S3", 10.0, 1)
            .with_operation_throttle("S3", "GetObject", 5.0, 1)
            .build();
        assert_eq!(throttler.len(), 6);
        assert_eq!(throttler.pairs[4].condition.to_string(), "S3");
        assert_eq!(throttler.pairs[5].condition.to_string(), "S3:GetObject");
    }

    #[test]
    fn matching_counts_overlapping_rules() {
        let throttler = Throttler::builder()
            .with_service_throttle("S3", 10.0, 1)
            .with_operation_throttle("S3", "GetObject", 5.0, 1)
            .with_operation_pattern_throttle("S3", Regex::new("Object").unwrap(), 5.0, 1)
            .build();
        assert_eq!(throttler.matching(&Request::new("S3").with_operation("GetObject")), 3);
        assert_eq!(throttler.matching(&Request::new("S3").with_operation("ListBuckets")), 1);
        assert_eq!(throttler.matching(&Request::new("S3")), 1);
        assert_eq!(throttler.matching(&Request::new("ECR")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_buckets() {
        let throttler = Throttler::builder().with_service_throttle("X", 1.0, 1).build();
        let other = throttler.clone();
        let req = Request::new("X");
        let start = Instant::now();
        throttler.gate(&req).await.unwrap();
        other.gate(&req).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn empty_throttler_passes_everything() {
        let throttler = Throttler::builder().build();
        assert!(throttler.is_empty());
        let req = Request::new("X").with_operation("Anything");
        req.context().cancel();
        // Nothing matches, so even a cancelled request is not held or rejected.
        assert_eq!(throttler.gate(&req).await, Ok(()));
    }
}
