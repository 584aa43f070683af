//! Dispatch error type.

use http::Method;
use std::any::Any;
use std::fmt;

/// Failure modes of the dispatch pipeline.
///
/// Only [`RouteNotFound`](DispatchError::RouteNotFound) ever reaches a client
/// with its own body (a 404). Faults are answered with a generic 500 and the
/// detail stays in the logs.
#[derive(Debug)]
pub enum DispatchError {
    /// No handler for this method and path.
    RouteNotFound { method: Method, path: String },
    /// A middleware returned an error or panicked.
    MiddlewareFault(anyhow::Error),
    /// A route handler returned an error or panicked.
    HandlerFault(anyhow::Error),
}

impl DispatchError {
    /// HTTP status the client sees for this error.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::RouteNotFound { .. } => 404,
            DispatchError::MiddlewareFault(_) | DispatchError::HandlerFault(_) => 500,
        }
    }

    #[must_use]
    pub fn is_fault(&self) -> bool {
        !matches!(self, DispatchError::RouteNotFound { .. })
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::RouteNotFound { method, path } => {
                write!(f, "no route for {method} {path}")
            }
            DispatchError::MiddlewareFault(e) => write!(f, "middleware fault: {e:#}"),
            DispatchError::HandlerFault(e) => write!(f, "handler fault: {e:#}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::RouteNotFound { .. } => None,
            DispatchError::MiddlewareFault(e) | DispatchError::HandlerFault(e) => Some(&**e),
        }
    }
}

/// Best-effort text of a `catch_unwind` payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
