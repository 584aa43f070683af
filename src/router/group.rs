use http::Method;
use std::sync::Arc;

use super::core::{Handler, Router};
use crate::dispatcher::Context;

/// Registration scope that prepends a path prefix.
///
/// Obtained from [`Router::group`]. Routes land in the owning router's tree
/// under `prefix + path`; the group itself holds no state past registration.
pub struct RouteGroup<'r> {
    router: &'r mut Router,
    prefix: String,
}

impl<'r> RouteGroup<'r> {
    pub(crate) fn new(router: &'r mut Router, prefix: &str) -> Self {
        Self {
            router,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// The prefix with any trailing slash removed.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn join(&self, path: &str) -> String {
        format!("{}/{}", self.prefix, path.trim_start_matches('/'))
    }

    pub fn register<F>(&mut self, method: Method, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_handler(method, path, Arc::new(handler))
    }

    pub fn register_handler(
        &mut self,
        method: Method,
        path: &str,
        handler: Arc<dyn Handler>,
    ) -> &mut Self {
        let full = self.join(path);
        self.router.register_handler(method, &full, handler);
        self
    }

    pub fn get<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::GET, path, handler)
    }

    pub fn post<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::POST, path, handler)
    }

    pub fn put<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::PUT, path, handler)
    }

    pub fn patch<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::PATCH, path, handler)
    }

    pub fn delete<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::DELETE, path, handler)
    }

    pub fn head<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::HEAD, path, handler)
    }

    pub fn options<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Method::OPTIONS, path, handler)
    }

    /// Nested group; prefixes concatenate.
    pub fn group<F>(&mut self, prefix: &str, build: F) -> &mut Self
    where
        F: FnOnce(&mut RouteGroup<'_>),
    {
        let nested_prefix = self.join(prefix);
        let mut nested = RouteGroup::new(self.router, &nested_prefix);
        build(&mut nested);
        self
    }
}
