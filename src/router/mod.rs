//! # Router Module
//!
//! Path matching and the registration facade for wren.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Storing handlers in a segment tree keyed by path segment and HTTP method
//! - Matching request paths, capturing `:name` segments as path parameters
//! - Grouping registrations under a common prefix
//! - Running the middleware chain in front of the matched handler
//!
//! ## Matching rules
//!
//! Static segments are tried before the dynamic child of a node, and each node
//! has at most one dynamic child. The first `:name` registered at a position
//! fixes the parameter name for every pattern sharing that position. Once a
//! static segment is taken the matcher never backtracks into the dynamic
//! sibling. Registering the same method and pattern twice keeps the later
//! handler.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use wren::router::Router;
//!
//! let mut router = Router::new();
//! router.get("/pets/:id", |ctx| {
//!     let id = ctx.param("id").unwrap_or_default().to_string();
//!     ctx.text(format!("pet {id}"));
//!     Ok(())
//! });
//!
//! let route = router.find(&Method::GET, "/pets/7").unwrap();
//! assert_eq!(route.path_params[0].1, "7");
//! ```

mod core;
mod group;
mod radix;

pub use core::{
    Handler, ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS, NOT_FOUND_BODY,
};
pub use group::RouteGroup;
pub use radix::{PathTree, TreeMatch, PARAM_MARKER};
pub(crate) use radix::segments;
