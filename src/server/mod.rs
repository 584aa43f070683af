//! Transport adapter between `may_minihttp` and the router.
//!
//! Each connection is served on its own `may` coroutine. A request is turned
//! into a [`Context`](crate::dispatcher::Context), run through
//! [`Router::handle`](crate::router::Router::handle), and the finalized
//! response is written back.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::parse_request;
pub use response::write_handler_response;
pub use service::AppService;
