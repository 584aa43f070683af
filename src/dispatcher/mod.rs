//! # Dispatcher Module
//!
//! The per-request [`Context`] and the one-shot response slot behind it.
//!
//! ## Overview
//!
//! A `Context` is built by the transport for every request. It carries:
//! - method, path, parsed query, headers and cookies (read-only)
//! - captured path parameters, filled in once the route resolves
//! - a free-form `state` map of JSON values for passing data between middleware
//! - the response slot, reachable only through [`Context::dispatch`] and the
//!   helpers built on it
//!
//! ## Exactly one response
//!
//! `dispatch` flips an atomic flag with compare-and-set. The winner writes the
//! status, headers and body; every later call returns `false` and changes
//! nothing. [`Responder`] handles share the same slot, so a response sent from
//! another coroutine cannot race the chain.
//!
//! ```rust
//! use http::Method;
//! use wren::dispatcher::{Context, DispatchOptions, HeaderVec};
//!
//! let ctx = Context::new(Method::GET, "/hello?name=wren", HeaderVec::new(), Vec::new());
//! assert!(ctx.dispatch("hi", DispatchOptions::status(201)));
//! assert!(!ctx.text("ignored"));
//!
//! let response = ctx.take_response().unwrap();
//! assert_eq!(response.status, Some(201));
//! assert_eq!(response.body, b"hi");
//! ```

mod cookies;
mod core;

pub use cookies::{parse_cookies, serialize_cookie, CookieOptions, SameSite};
pub use core::{
    parse_query, Context, DispatchOptions, HandlerResponse, HeaderVec, Payload, QueryValue,
    Responder, INTERNAL_ERROR_BODY, JSON_CONTENT_TYPE, MAX_INLINE_HEADERS, TEXT_CONTENT_TYPE,
};
