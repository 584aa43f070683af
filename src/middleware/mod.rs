//! # Middleware Module
//!
//! Continuation-passing interceptors that run in front of every handler.
//!
//! Each middleware gets the [`Context`](crate::dispatcher::Context) and a
//! [`Next`] continuation. Calling `next.run(ctx)` hands control to the rest of
//! the chain; code after that call runs on the way back out, so one
//! middleware can both pre- and post-process a request.
//!
//! ```rust
//! use wren::middleware::Next;
//! use wren::router::Router;
//!
//! let mut router = Router::new();
//! router.use_fn(|ctx, next: Next<'_>| {
//!     ctx.set_state("seen", true);
//!     next.run(ctx)
//! });
//! ```
//!
//! Built-in middleware:
//! - [`JsonBody`] parses JSON request bodies
//! - [`RequestTrace`] logs requests and their outcome
//! - [`AuthMiddleware`] rejects requests without a static token
//! - [`MetricsMiddleware`] counts requests and latency

mod auth;
mod core;
mod json_body;
mod metrics;
mod tracing;

pub use auth::AuthMiddleware;
pub use core::{contain_fault, Endpoint, Middleware, MiddlewareChain, Next};
pub use json_body::JsonBody;
pub use metrics::MetricsMiddleware;
pub use tracing::{RequestTrace, TraceOptions};
