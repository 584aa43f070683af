//! # wren
//!
//! **wren** is a small, coroutine-powered HTTP dispatch engine built on the
//! `may` runtime and `may_minihttp`.
//!
//! ## Overview
//!
//! A request flows through three pieces:
//!
//! - **[`router`]** - a segment tree keyed by HTTP method. `:name` segments
//!   capture path parameters; static segments always beat dynamic ones.
//! - **[`middleware`]** - an onion-style chain. Each middleware receives the
//!   request [`Context`](dispatcher::Context) and a [`Next`](middleware::Next)
//!   continuation and decides whether to call it. A failing middleware is
//!   contained and answered with a generic 500.
//! - **[`dispatcher`]** - the per-request [`Context`](dispatcher::Context).
//!   Responding is one-shot: the first dispatch wins and later attempts are
//!   ignored.
//!
//! [`server`] adapts all of this to `may_minihttp`, one coroutine per
//! connection.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use wren::dispatcher::{Context, HeaderVec};
//! use wren::middleware::Next;
//! use wren::router::Router;
//!
//! let mut router = Router::new();
//! router.use_fn(|ctx: &mut Context, next: Next<'_>| {
//!     ctx.set_header("x-powered-by", "wren");
//!     next.run(ctx)
//! });
//! router.get("/hello/:name", |ctx| {
//!     let name = ctx.param("name").unwrap_or_default().to_string();
//!     ctx.text(format!("Hello, {name}!"));
//!     Ok(())
//! });
//!
//! let mut ctx = Context::new(Method::GET, "/hello/ada", HeaderVec::new(), Vec::new());
//! router.handle(&mut ctx).unwrap();
//! let response = ctx.take_response().unwrap();
//! assert_eq!(response.body_str(), "Hello, ada!");
//! assert_eq!(response.get_header("x-powered-by"), Some("wren"));
//! ```
//!
//! ## Configuration
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `WREN_STACK_SIZE` | Coroutine stack size (decimal or `0x` hex) | `0x8000` |
//! | `WREN_CONTAIN_HANDLER_FAULTS` | Answer handler faults with 500 inside the router | `true` |
//! | `WREN_LOG_LEVEL` | Base log level | `info` |
//! | `WREN_LOG_FORMAT` | `json` or `pretty` | `json` |
//! | `WREN_LOG_ASYNC` | Non-blocking log writer | `true` |
//! | `RUST_LOG` | Full `EnvFilter` override | unset |

pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use dispatcher::{Context, DispatchOptions, HandlerResponse, Payload};
pub use error::DispatchError;
pub use ids::RequestId;
pub use middleware::{Middleware, Next};
pub use router::{Handler, RouteGroup, Router};
pub use runtime_config::RuntimeConfig;
