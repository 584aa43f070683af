use serde_json::json;
use tracing::debug;

use super::{Middleware, Next};
use crate::dispatcher::{Context, DispatchOptions, Payload};

/// Static token gate.
///
/// Requests whose `authorization` header is not exactly the configured token
/// get `401 {"error":"Unauthorized"}` and never reach later middleware or the
/// handler.
pub struct AuthMiddleware {
    token: String,
}

impl AuthMiddleware {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Middleware for AuthMiddleware {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> anyhow::Result<()> {
        match ctx.header("authorization") {
            Some(h) if h == self.token => next.run(ctx),
            _ => {
                debug!(request_id = %ctx.request_id, path = %ctx.path(), "Rejected unauthorized request");
                ctx.dispatch(
                    Payload::Json(json!({ "error": "Unauthorized" })),
                    DispatchOptions::status(401),
                );
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "AuthMiddleware"
    }
}
