//! The application behind `wren serve` and `wren routes`.

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::dispatcher::{Context, CookieOptions, DispatchOptions, SameSite};
use crate::middleware::{
    AuthMiddleware, JsonBody, Middleware, MetricsMiddleware, Next, RequestTrace,
};
use crate::router::{segments, Router};
use crate::runtime_config::RuntimeConfig;

/// Path prefix guarded by the admin token.
pub const ADMIN_PREFIX: &str = "/admin";

/// Build the demo router.
///
/// Middleware order: request logging, metrics, JSON bodies, then the admin
/// token check for paths under [`ADMIN_PREFIX`].
pub fn demo_router(config: &RuntimeConfig, admin_token: Option<String>) -> Router {
    let mut router = Router::with_config(config);
    let metrics = Arc::new(MetricsMiddleware::new());

    router
        .use_middleware(RequestTrace::default())
        .use_shared(Arc::clone(&metrics) as Arc<dyn Middleware>)
        .use_middleware(JsonBody::new());

    if let Some(token) = admin_token {
        let auth = AuthMiddleware::new(token);
        router.use_fn(move |ctx: &mut Context, next: Next<'_>| {
            if is_admin_path(ctx.path()) {
                auth.handle(ctx, next)
            } else {
                next.run(ctx)
            }
        });
    }

    router.get("/", |ctx| {
        ctx.json(json!({ "message": "Hello, wren!" }));
        Ok(())
    });

    router.get("/health", |ctx| {
        ctx.json(json!({ "status": "ok" }));
        Ok(())
    });

    let counters = Arc::clone(&metrics);
    router.get("/metrics", move |ctx| {
        ctx.json(json!({
            "request_count": counters.request_count(),
            "average_latency_us": u64::try_from(counters.average_latency().as_micros()).unwrap_or(u64::MAX),
            "client_errors": counters.client_errors(),
            "server_errors": counters.server_errors(),
            "stack_size": counters.stack_size(),
        }));
        Ok(())
    });

    router.get("/about/:name", |ctx| {
        let name = ctx.param("name").unwrap_or("stranger").to_string();
        ctx.text(format!("About {name}"));
        Ok(())
    });

    router.group("/api", |api| {
        api.get("/users", |ctx| {
            let limit = ctx
                .query_param("limit")
                .and_then(|l| l.parse::<usize>().ok())
                .unwrap_or(10);
            let users: Vec<_> = (1..=limit.min(3))
                .map(|id| json!({ "id": id.to_string(), "name": format!("user-{id}") }))
                .collect();
            ctx.json(users);
            Ok(())
        });

        api.get("/users/me", |ctx| {
            match ctx.cookie("session") {
                Some(session) => {
                    let session = session.to_string();
                    ctx.json(json!({ "session": session }));
                }
                None => {
                    ctx.dispatch(
                        json!({ "error": "Not logged in" }),
                        DispatchOptions::status(401),
                    );
                }
            }
            Ok(())
        });

        api.get("/users/:id", |ctx| {
            let id = ctx.param("id").unwrap_or_default().to_string();
            ctx.json(json!({ "id": id, "name": format!("user-{id}") }));
            Ok(())
        });

        api.post("/users", |ctx| {
            let name = ctx
                .body
                .as_ref()
                .and_then(|b| b.get("name"))
                .and_then(|n| n.as_str())
                .map(str::to_string);
            match name {
                Some(name) => {
                    ctx.status(201);
                    ctx.json(json!({ "id": "4", "name": name }));
                }
                None => {
                    ctx.dispatch(
                        json!({ "error": "name is required" }),
                        DispatchOptions::status(400),
                    );
                }
            }
            Ok(())
        });
    });

    router.post("/login", |ctx| {
        let user = ctx
            .body
            .as_ref()
            .and_then(|b| b.get("user"))
            .and_then(|u| u.as_str())
            .unwrap_or("guest")
            .to_string();
        let options = CookieOptions::new()
            .path("/")
            .http_only()
            .same_site(SameSite::Lax)
            .expires(Utc::now() + Duration::hours(8));
        ctx.set_cookie("session", &user, &options);
        ctx.json(json!({ "logged_in": user }));
        Ok(())
    });

    router.get("/logout", |ctx| {
        let expired = CookieOptions::new()
            .path("/")
            .expires(Utc::now() - Duration::days(1));
        ctx.set_cookie("session", "", &expired);
        ctx.redirect("/");
        Ok(())
    });

    router.group(ADMIN_PREFIX, |admin| {
        admin.get("/stats", move |ctx| {
            ctx.json(json!({ "requests": metrics.request_count() }));
            Ok(())
        });
    });

    router
}

/// Whether `path` routes into the admin group. Compared by segment, the way
/// the path tree walks it, so `//admin/stats` counts and `/administrator`
/// does not.
fn is_admin_path(path: &str) -> bool {
    let admin = ADMIN_PREFIX.trim_start_matches('/');
    segments(path).next() == Some(admin)
}
