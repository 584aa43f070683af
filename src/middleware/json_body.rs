use http::Method;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{Middleware, Next};
use crate::dispatcher::{Context, JSON_CONTENT_TYPE};

/// Parses JSON request bodies into [`Context::body`].
///
/// Applies to `POST`, `PUT` and `PATCH` requests whose `content-type`
/// mentions `application/json`. An empty body, or one that fails to parse,
/// becomes `{}`. The chain always continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody;

impl JsonBody {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn applies(ctx: &Context) -> bool {
        matches!(*ctx.method(), Method::POST | Method::PUT | Method::PATCH)
            && ctx
                .header("content-type")
                .is_some_and(|ct| ct.contains(JSON_CONTENT_TYPE))
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Middleware for JsonBody {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> anyhow::Result<()> {
        if !Self::applies(ctx) {
            return next.run(ctx);
        }

        let raw = ctx.raw_body();
        let parsed = if raw.iter().all(u8::is_ascii_whitespace) {
            empty_object()
        } else {
            match serde_json::from_slice::<Value>(raw) {
                Ok(value) => value,
                Err(err) => {
                    warn!(
                        request_id = %ctx.request_id,
                        error = %err,
                        raw_body = %String::from_utf8_lossy(raw),
                        "JSON body parse failed; using empty object"
                    );
                    empty_object()
                }
            }
        };
        debug!(request_id = %ctx.request_id, bytes = raw.len(), "JSON body parsed");
        ctx.body = Some(parsed);
        next.run(ctx)
    }

    fn name(&self) -> &'static str {
        "JsonBody"
    }
}
