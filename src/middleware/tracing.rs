use std::time::Instant;

use tracing::info;

use super::{Middleware, Next};
use crate::dispatcher::Context;

/// Options for [`RequestTrace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceOptions {
    pub log_request: bool,
    pub log_response: bool,
    pub prefix: String,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            log_request: true,
            log_response: true,
            prefix: "wren".to_string(),
        }
    }
}

/// Logs each request on the way in and its outcome on the way out.
///
/// No span is held across `next`: a `may` coroutine can resume on another
/// worker thread, which would corrupt the thread-local span stack.
#[derive(Debug, Clone, Default)]
pub struct RequestTrace {
    options: TraceOptions,
}

impl RequestTrace {
    #[must_use]
    pub fn new(options: TraceOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &TraceOptions {
        &self.options
    }
}

impl Middleware for RequestTrace {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> anyhow::Result<()> {
        let prefix = self.options.prefix.as_str();
        let request_id = ctx.request_id;

        if self.options.log_request {
            info!(
                prefix,
                request_id = %request_id,
                method = %ctx.method(),
                url = %ctx.url(),
                "Incoming request"
            );
        }

        let start = Instant::now();
        let result = next.run(ctx);

        if self.options.log_response {
            info!(
                prefix,
                request_id = %request_id,
                status = ?ctx.sent_status(),
                ok = result.is_ok(),
                latency_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
                "Request completed"
            );
        }
        result
    }

    fn name(&self) -> &'static str {
        "RequestTrace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::HeaderVec;
    use crate::middleware::MiddlewareChain;
    use http::Method;
    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let trace = RequestTrace::default();
        assert!(trace.options().log_request);
        assert!(trace.options().log_response);
        assert_eq!(trace.options().prefix, "wren");
    }

    #[test]
    fn test_passes_through_and_propagates_result() {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(RequestTrace::new(TraceOptions {
            log_request: false,
            prefix: "test".into(),
            ..TraceOptions::default()
        })));
        let mut ctx = Context::new(Method::GET, "/traced", HeaderVec::new(), Vec::new());
        chain
            .run(&mut ctx, &|ctx: &mut Context| {
                ctx.text("ok");
                Ok(())
            })
            .unwrap();
        assert_eq!(ctx.take_response().unwrap().body, b"ok");
    }
}
