//! Middleware pipeline — composable before/after request handler logic.
//!
//! The gateway composes a short stack in front of each route: a request
//! logger on every route, and the bearer-token guard on protected ones.
//! Each middleware wraps the next layer, enabling request inspection,
//! short-circuit responses (the guard's 401), and response decoration
//! without coupling handlers to infrastructure concerns.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`]
//!   to advance to the next layer.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] — converts a [`Middleware`] trait object into a
//!   [`MiddlewareHandler`].
//! - [`stack`] — builds a route handler from an ordered middleware stack and
//!   a terminal business handler.
//! - [`RequestLogger`] — built-in request/response logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{
    Response,
    context::Context,
    router::IntoHandler,
};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`]
/// implementation. Calling [`Next::run`] advances the cursor by one position
/// and invokes the next middleware, or returns a fallback `500` response
/// when the chain is exhausted without any layer generating a response.
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be
/// called more than once per middleware invocation.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// Builds a route handler that runs `layers` in order and finishes with
/// `handler` as the terminal layer.
///
/// The terminal layer ignores its `Next` cursor, so the chain always ends in
/// the business handler rather than the pipeline's 500 fallback.
pub fn stack(
    mut layers: Vec<MiddlewareHandler>,
    handler: impl IntoHandler,
) -> impl Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static {
    let handler = Arc::new(handler);
    let terminal: MiddlewareHandler = Arc::new(move |ctx, _next| handler.call(ctx));
    layers.push(terminal);

    move |ctx: Context| -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let layers = layers.clone();
        Box::pin(async move { Next::new(layers).run(ctx).await })
    }
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// Advances the internal cursor by one, clones the handler at the current
    /// position, and awaits it. If no handler remains, a `500 Internal Server
    /// Error` response is returned as a safe fallback.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            Response::new(crate::StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }
}

/// The core trait for all irisgate middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(ctx).await`, inspect the response, and
///   return a modified copy.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared
///   across Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future so it can be awaited
///   across `.await` points in multi-threaded runtimes.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Built-in middleware that logs each request's method, path, status, and duration.
///
/// Emits a single `tracing::info!` line after the downstream handler
/// completes:
///
/// ```text
/// METHOD /path - STATUS (duration)
/// ```
///
/// `RequestLogger` never short-circuits; it always delegates to the next
/// layer and records timing after the fact.
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_string();
            let path = ctx.request().path().to_string();

            let response = next.run(ctx).await;

            let duration = start.elapsed();
            let status = response.status().as_u16();

            tracing::info!("{} {} - {} ({:?})", method, path, status, duration);

            response
        })
    }
}
