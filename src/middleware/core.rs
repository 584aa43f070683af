use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

use crate::dispatcher::{Context, DispatchOptions, INTERNAL_ERROR_BODY};
use crate::error::{panic_message, DispatchError};

/// A cross-cutting request interceptor.
///
/// `handle` receives the context and the continuation for the rest of the
/// pipeline. Calling [`Next::run`] proceeds; returning without calling it
/// halts the chain (usually after dispatching a response). Work placed after
/// `next.run(ctx)` runs once everything downstream has finished.
///
/// Returning `Err` or panicking before a response was sent yields a generic
/// 500 and stops the chain.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> anyhow::Result<()>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F> Middleware for F
where
    F: Fn(&mut Context, Next<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> anyhow::Result<()> {
        self(ctx, next)
    }
}

/// Terminal step invoked once every middleware has passed the request on.
pub type Endpoint<'a> = dyn Fn(&mut Context) -> anyhow::Result<()> + 'a;

/// Continuation handed to each middleware: the rest of the pipeline.
///
/// Consumed by [`run`](Next::run), so a middleware can continue at most once.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    endpoint: &'a Endpoint<'a>,
}

impl<'a> Next<'a> {
    /// Run the remaining middleware and then the endpoint.
    ///
    /// Returns immediately once a response has been dispatched.
    pub fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        if ctx.responded() {
            return Ok(());
        }
        match self.remaining.split_first() {
            Some((middleware, rest)) => {
                let next = Next {
                    remaining: rest,
                    endpoint: self.endpoint,
                };
                invoke_guarded(&**middleware, ctx, next)
            }
            None => (self.endpoint)(ctx),
        }
    }

    /// Number of middleware still ahead of the endpoint.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

/// Invoke one middleware, converting its errors and panics into a contained
/// fault. Handler faults coming back up through `next` pass untouched.
fn invoke_guarded(
    middleware: &dyn Middleware,
    ctx: &mut Context,
    next: Next<'_>,
) -> anyhow::Result<()> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| middleware.handle(ctx, next)));
    let fault = match outcome {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) if is_handler_fault(&err) => return Err(err),
        Ok(Err(err)) => err,
        Err(payload) => anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref())),
    };
    let fault = fault.context(format!("middleware {}", middleware.name()));
    contain_fault(ctx, &DispatchError::MiddlewareFault(fault));
    Ok(())
}

fn is_handler_fault(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<DispatchError>(),
        Some(DispatchError::HandlerFault(_))
    )
}

/// Answer a fault with a generic 500, or only log it if a response already
/// went out.
pub fn contain_fault(ctx: &Context, fault: &DispatchError) {
    if ctx.dispatch(INTERNAL_ERROR_BODY, DispatchOptions::status(500)) {
        error!(
            request_id = %ctx.request_id,
            method = %ctx.method(),
            path = %ctx.path(),
            error = %fault,
            "Fault contained; sent 500"
        );
    } else {
        warn!(
            request_id = %ctx.request_id,
            method = %ctx.method(),
            path = %ctx.path(),
            error = %fault,
            "Fault after response was already sent; not re-dispatched"
        );
    }
}

/// Ordered middleware list. Shared read-only while serving.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run every middleware in registration order, then `endpoint`.
    pub fn run(&self, ctx: &mut Context, endpoint: &Endpoint<'_>) -> anyhow::Result<()> {
        Next {
            remaining: &self.middlewares,
            endpoint,
        }
        .run(ctx)
    }
}
