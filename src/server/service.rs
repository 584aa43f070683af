use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use tracing::{error, warn};

use super::request::parse_request;
use super::response::write_handler_response;
use crate::dispatcher::{
    Context, DispatchOptions, HandlerResponse, HeaderVec, INTERNAL_ERROR_BODY, TEXT_CONTENT_TYPE,
};
use crate::router::Router;

/// `may_minihttp` service that feeds every request through a frozen [`Router`].
///
/// Cloned once per connection; clones share the router.
#[derive(Clone)]
pub struct AppService {
    router: Arc<Router>,
}

impl AppService {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Run the pipeline and return whatever must go on the wire.
    ///
    /// Always yields a response: an escaped handler fault becomes a 500, and
    /// so does a request that nothing answered.
    pub fn respond(&self, ctx: &mut Context) -> HandlerResponse {
        if let Err(err) = self.router.handle(ctx) {
            error!(
                request_id = %ctx.request_id,
                method = %ctx.method(),
                path = %ctx.path(),
                error = %err,
                "Request failed"
            );
            ctx.dispatch(INTERNAL_ERROR_BODY, DispatchOptions::status(err.status()));
        }

        // Claim the slot so a responder clone still held elsewhere learns it
        // lost instead of answering into the void.
        if ctx.dispatch(INTERNAL_ERROR_BODY, DispatchOptions::status(500)) {
            warn!(
                request_id = %ctx.request_id,
                method = %ctx.method(),
                path = %ctx.path(),
                "Pipeline finished without a response; sending 500"
            );
        }

        ctx.take_response()
            .unwrap_or_else(|| plain_text(500, INTERNAL_ERROR_BODY))
    }
}

fn plain_text(status: u16, body: &str) -> HandlerResponse {
    let mut headers = HeaderVec::new();
    headers.push((Arc::from("content-type"), TEXT_CONTENT_TYPE.to_string()));
    HandlerResponse {
        status: Some(status),
        headers,
        body: body.as_bytes().to_vec(),
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let response = match parse_request(req) {
            Ok(mut ctx) => self.respond(&mut ctx),
            Err(err) => {
                warn!(error = %err, "Rejected request with invalid method");
                plain_text(400, "400 - Bad Request")
            }
        };
        write_handler_response(res, response);
        Ok(())
    }
}
