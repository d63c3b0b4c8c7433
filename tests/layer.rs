#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use throttle_gate::{CancelContext, Request, ThrottleLayer, ThrottleServiceError, Throttler};
    use tokio::time::Instant;
    use tower::{service_fn, Layer, ServiceBuilder, ServiceExt};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    fn throttler() -> Throttler {
        Throttler::builder().with_service_throttle("ECR", 4.0, 1).build()
    }

    #[tokio::test(start_paused = true)]
    async fn layer_gates_before_inner_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner_calls = calls.clone();
        let svc = ServiceBuilder::new().layer(ThrottleLayer::new(throttler())).service(
            service_fn(move |req: Request| {
                let calls = inner_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(req.operation().map(|op| op.name.clone()))
                }
            }),
        );

        let start = Instant::now();
        let first = svc.clone().oneshot(Request::new("ECR").with_operation("ListImages")).await;
        assert_eq!(first.unwrap(), Some("ListImages".to_string()));
        let second = svc.clone().oneshot(Request::new("ECR").with_operation("ListImages")).await;
        assert!(second.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(250));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_failure_skips_inner_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner_calls = calls.clone();
        let svc = ThrottleLayer::new(throttler()).layer(service_fn(move |_req: Request| {
            inner_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, TestError>(()) }
        }));

        let ctx = CancelContext::background();
        ctx.cancel();
        let err = svc.oneshot(Request::new("ECR").with_context(ctx)).await.unwrap_err();
        assert!(err.is_throttle());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inner_errors_are_wrapped() {
        let svc = ServiceBuilder::new()
            .layer(ThrottleLayer::new(throttler()))
            .service(service_fn(|_req: Request| async { Err::<(), _>(TestError("boom".into())) }));

        match svc.oneshot(Request::new("S3")).await {
            Err(ThrottleServiceError::Inner(e)) => assert_eq!(e.0, "boom"),
            other => panic!("expected inner error, got {:?}", other),
        }
    }
}
