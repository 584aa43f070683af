use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::{Middleware, Next};
use crate::dispatcher::Context;

/// Request counters, updated around the rest of the chain.
///
/// Register through [`Router::use_shared`](crate::router::Router::use_shared)
/// to keep a handle for reading the counters.
///
/// Metrics collected:
/// - Total request count
/// - Average latency of everything downstream of this middleware
/// - Responses by class (2xx/3xx, 4xx, 5xx)
/// - Coroutine stack size
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    client_errors: AtomicUsize,
    server_errors: AtomicUsize,
    stack_size: AtomicUsize,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of requests processed
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Calculate the average request latency
    ///
    /// Returns zero duration if no requests have been processed yet.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Responses with a 4xx status.
    pub fn client_errors(&self) -> usize {
        self.client_errors.load(Ordering::Relaxed)
    }

    /// Responses with a 5xx status.
    pub fn server_errors(&self) -> usize {
        self.server_errors.load(Ordering::Relaxed)
    }

    /// Stack size of the coroutine that served the latest request.
    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }
}

impl Middleware for MetricsMiddleware {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> anyhow::Result<()> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let result = next.run(ctx);

        let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.total_latency_ns.fetch_add(elapsed, Ordering::Relaxed);
        match ctx.sent_status() {
            Some(400..=499) => {
                self.client_errors.fetch_add(1, Ordering::Relaxed);
            }
            Some(500..=599) => {
                self.server_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        let stack = if may::coroutine::is_coroutine() {
            may::coroutine::current().stack_size()
        } else {
            may::config().get_stack_size()
        };
        self.stack_size.store(stack, Ordering::Relaxed);
        result
    }

    fn name(&self) -> &'static str {
        "MetricsMiddleware"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{DispatchOptions, HeaderVec};
    use crate::middleware::MiddlewareChain;
    use http::Method;
    use std::sync::Arc;

    #[test]
    fn test_counts_requests_and_classes() {
        let metrics = Arc::new(MetricsMiddleware::new());
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::clone(&metrics) as Arc<dyn Middleware>);

        for status in [200_u16, 404, 500, 201] {
            let mut ctx = Context::new(Method::GET, "/", HeaderVec::new(), Vec::new());
            chain
                .run(&mut ctx, &|ctx: &mut Context| {
                    ctx.dispatch("x", DispatchOptions::status(status));
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(metrics.request_count(), 4);
        assert_eq!(metrics.client_errors(), 1);
        assert_eq!(metrics.server_errors(), 1);
        assert!(metrics.stack_size() > 0);
    }

    #[test]
    fn test_average_latency_zero_without_requests() {
        assert_eq!(MetricsMiddleware::new().average_latency(), Duration::ZERO);
    }
}
