//! Router facade - registration API and per-request entry point.
//!
//! The router owns the [`PathTree`] and the [`MiddlewareChain`]. Everything
//! that mutates either one takes `&mut self`, so registration has to finish
//! before the router is frozen into an `Arc` and handed to the server.

use http::Method;
use smallvec::SmallVec;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::group::RouteGroup;
use super::radix::{normalize, PathTree};
use crate::dispatcher::{Context, DispatchOptions};
use crate::error::{panic_message, DispatchError};
use crate::middleware::{contain_fault, Middleware, MiddlewareChain, Next};
use crate::runtime_config::RuntimeConfig;

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured path parameters, in path order.
///
/// Param names are `Arc<str>` shared with the tree node that captured them.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Body sent when no route matches.
pub const NOT_FOUND_BODY: &str = "404 - Not Found";

/// Terminal request handler.
///
/// Implemented for every `Fn(&mut Context) -> anyhow::Result<()>`. A handler
/// answers through [`Context::dispatch`] (or one of its helpers); returning
/// `Err` or panicking is a handler fault.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: &mut Context) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync,
{
    fn call(&self, ctx: &mut Context) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// A resolved route: the handler plus the parameters captured on the way.
#[derive(Clone)]
pub struct RouteMatch {
    pub handler: Arc<dyn Handler>,
    pub path_params: ParamVec,
}

impl std::fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatch")
            .field("path_params", &self.path_params)
            .finish_non_exhaustive()
    }
}

/// Registration API plus the per-request dispatch entry point.
pub struct Router {
    tree: PathTree<Arc<dyn Handler>>,
    chain: MiddlewareChain,
    /// `(method, normalized pattern)` in first-registration order
    routes: Vec<(Method, String)>,
    contain_handler_faults: bool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create an empty router that contains handler faults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: PathTree::new(),
            chain: MiddlewareChain::new(),
            routes: Vec::new(),
            contain_handler_faults: true,
        }
    }

    /// Create an empty router configured from `config`.
    #[must_use]
    pub fn with_config(config: &RuntimeConfig) -> Self {
        let mut router = Self::new();
        router.contain_handler_faults = config.contain_handler_faults;
        router
    }

    /// Whether handler faults are converted into 500 responses.
    #[must_use]
    pub fn contains_handler_faults(&self) -> bool {
        self.contain_handler_faults
    }

    /// Register a handler closure for `method` at `pattern`.
    ///
    /// Re-registering the same method and pattern replaces the old handler.
    pub fn register<F>(&mut self, method: Method, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_handler(method, pattern, Arc::new(handler))
    }

    /// Register a shared [`Handler`] for `method` at `pattern`.
    pub fn register_handler(
        &mut self,
        method: Method,
        pattern: &str,
        handler: Arc<dyn Handler>,
    ) -> &mut Self {
        let normalized = normalize(pattern);
        let replaced = self.tree.insert(method.clone(), &normalized, handler).is_some();
        if replaced {
            debug!(method = %method, pattern = %normalized, "Route re-registered; previous handler replaced");
        } else {
            debug!(method = %method, pattern = %normalized, "Route registered");
            self.routes.push((method, normalized));
        }
        self
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::GET, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::POST, pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::PUT, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::PATCH, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::DELETE, pattern, handler)
    }

    pub fn head<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::HEAD, pattern, handler)
    }

    pub fn options<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::OPTIONS, pattern, handler)
    }

    /// Register every route added inside `build` under `prefix`.
    ///
    /// ```rust
    /// use http::Method;
    /// use wren::router::Router;
    ///
    /// let mut router = Router::new();
    /// router.group("/api/", |api| {
    ///     api.get("/users", |ctx| {
    ///         ctx.text("users");
    ///         Ok(())
    ///     });
    /// });
    ///
    /// assert!(router.find(&Method::GET, "/api/users").is_ok());
    /// assert!(router.find(&Method::GET, "/users").is_err());
    /// ```
    pub fn group<F>(&mut self, prefix: &str, build: F) -> &mut Self
    where
        F: FnOnce(&mut RouteGroup<'_>),
    {
        let mut group = RouteGroup::new(self, prefix);
        build(&mut group);
        self
    }

    /// Append a middleware; middleware run in the order they are added.
    pub fn use_middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.use_shared(Arc::new(middleware))
    }

    /// Append a middleware closure.
    pub fn use_fn<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context, Next<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.use_middleware(middleware)
    }

    /// Append a middleware that is also held elsewhere (e.g. to read its counters).
    pub fn use_shared(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        debug!(
            position = self.chain.len(),
            middleware = middleware.name(),
            "Middleware registered"
        );
        self.chain.push(middleware);
        self
    }

    /// Registered `(method, pattern)` pairs in first-registration order.
    #[must_use]
    pub fn routes(&self) -> &[(Method, String)] {
        &self.routes
    }

    /// Number of registered middleware.
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.chain.len()
    }

    /// Print all registered routes to stdout.
    pub fn dump_routes(&self) {
        println!(
            "[routes] count={} middleware={}",
            self.routes.len(),
            self.chain.len()
        );
        for (method, pattern) in &self.routes {
            println!("[route] {method} {pattern}");
        }
    }

    /// Resolve `path` for `method` against the tree.
    ///
    /// An unknown path and a known path without a handler for `method` both
    /// yield [`DispatchError::RouteNotFound`].
    pub fn find(&self, method: &Method, path: &str) -> Result<RouteMatch, DispatchError> {
        let found = self.tree.find(method, path);
        match found.handler {
            Some(handler) => Ok(RouteMatch {
                handler: Arc::clone(handler),
                path_params: found.params,
            }),
            None => Err(DispatchError::RouteNotFound {
                method: method.clone(),
                path: path.to_string(),
            }),
        }
    }

    /// Run the full pipeline for one request.
    ///
    /// Middleware run first; if none of them responded, the terminal step
    /// resolves the route and runs its handler. Unmatched requests get a 404.
    ///
    /// Returns `Err(DispatchError::HandlerFault)` only when handler fault
    /// containment is switched off and a handler failed; the response slot is
    /// then still empty and the caller decides what to send.
    pub fn handle(&self, ctx: &mut Context) -> Result<(), DispatchError> {
        let resolve = |ctx: &mut Context| self.resolve(ctx);
        self.chain.run(ctx, &resolve).map_err(|err| {
            match err.downcast::<DispatchError>() {
                Ok(dispatch_err) => dispatch_err,
                Err(other) => DispatchError::HandlerFault(other),
            }
        })
    }

    /// Terminal step of the chain: route lookup and handler invocation.
    fn resolve(&self, ctx: &mut Context) -> anyhow::Result<()> {
        let route = match self.find(ctx.method(), ctx.path()) {
            Ok(route) => route,
            Err(not_found) => {
                info!(request_id = %ctx.request_id, error = %not_found, "No route matched");
                ctx.dispatch(NOT_FOUND_BODY, DispatchOptions::status(404));
                return Ok(());
            }
        };

        debug!(
            request_id = %ctx.request_id,
            method = %ctx.method(),
            path = %ctx.path(),
            path_params = ?route.path_params,
            "Route matched"
        );
        ctx.set_params(route.path_params);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| route.handler.call(ctx)));
        let fault = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(payload) => anyhow::anyhow!("handler panicked: {}", panic_message(payload.as_ref())),
        };

        if self.contain_handler_faults {
            contain_fault(ctx, &DispatchError::HandlerFault(fault));
            Ok(())
        } else {
            error!(
                request_id = %ctx.request_id,
                error = %format!("{fault:#}"),
                "Handler fault escaped the dispatch pipeline"
            );
            Err(DispatchError::HandlerFault(fault).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::HeaderVec;
    use serde_json::json;

    fn request(method: Method, url: &str) -> Context {
        Context::new(method, url, HeaderVec::new(), Vec::new())
    }

    fn body_text(ctx: &Context) -> (Option<u16>, String) {
        let resp = ctx.take_response().expect("response dispatched");
        (resp.status, String::from_utf8_lossy(&resp.body).into_owned())
    }

    #[test]
    fn test_handler_sees_params() {
        let mut router = Router::new();
        router.get("/users/:id", |ctx| {
            let id = ctx.param("id").unwrap_or_default().to_string();
            ctx.json(json!({ "id": id }));
            Ok(())
        });

        let mut ctx = request(Method::GET, "/users/42");
        router.handle(&mut ctx).unwrap();
        let (status, body) = body_text(&ctx);
        assert_eq!(status, None);
        assert_eq!(body, r#"{"id":"42"}"#);
    }

    #[test]
    fn test_not_found_for_path_and_method() {
        let mut router = Router::new();
        router.get("/items", |ctx| {
            ctx.text("items");
            Ok(())
        });

        for (method, url) in [(Method::GET, "/nope"), (Method::POST, "/items")] {
            let mut ctx = request(method, url);
            router.handle(&mut ctx).unwrap();
            assert_eq!(body_text(&ctx), (Some(404), NOT_FOUND_BODY.to_string()));
        }
    }

    #[test]
    fn test_routes_listing_dedupes() {
        let mut router = Router::new();
        router
            .get("/a", |_| Ok(()))
            .get("/a/", |_| Ok(()))
            .post("a", |_| Ok(()));

        assert_eq!(
            router.routes(),
            &[(Method::GET, "/a".to_string()), (Method::POST, "/a".to_string())]
        );
    }

    #[test]
    fn test_handler_fault_contained_by_default() {
        let mut router = Router::new();
        router.get("/boom", |_| anyhow::bail!("database unavailable"));
        router.get("/panic", |_| panic!("handler exploded"));

        for url in ["/boom", "/panic"] {
            let mut ctx = request(Method::GET, url);
            router.handle(&mut ctx).unwrap();
            let (status, body) = body_text(&ctx);
            assert_eq!(status, Some(500));
            assert_eq!(body, "Internal Server Error");
        }
    }

    #[test]
    fn test_handler_fault_escapes_when_containment_disabled() {
        let config = RuntimeConfig {
            contain_handler_faults: false,
            ..RuntimeConfig::default()
        };
        let mut router = Router::with_config(&config);
        router.get("/boom", |_| anyhow::bail!("database unavailable"));

        let mut ctx = request(Method::GET, "/boom");
        let err = router.handle(&mut ctx).unwrap_err();
        assert!(matches!(err, DispatchError::HandlerFault(_)));
        assert!(!ctx.responded());
    }
}
