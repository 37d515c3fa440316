//! Request routing — map HTTP methods and exact paths to handler functions.
//!
//! The gateway serves a small, fixed route table, so patterns are exact
//! path strings. Trailing slashes are normalized on both patterns and
//! incoming paths, so `/predictions/` and `/predictions` are equivalent.
//!
//! Routes are matched in registration order; the first route whose method
//! and path both match the incoming request wins. An unregistered path gets
//! a `404 Not Found`; a registered path hit with the wrong method gets a
//! `405 Method Not Allowed`.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler that processes a [`Context`]
/// and returns a [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and
/// shared across threads without copying the underlying closure. In practice
/// you never construct this type directly — use [`Router::get`] and
/// [`Router::post`] instead.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the
/// blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

// Strip a trailing slash (other than on the root `/`) so `/x/` and `/x`
// compare equal.
fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A single registered route binding a method + exact path to a handler.
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

impl Route {
    fn new(method: Method, path: &str, handler: Handler) -> Self {
        Self {
            method,
            path: normalize(path).to_owned(),
            handler,
        }
    }

}

/// HTTP request router that dispatches requests to registered handler functions.
///
/// # Examples
///
/// ```rust,no_run
/// use irisgate::{Router, Response, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::Ok) });
/// ```
pub struct Router {
    routes: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    // Erase the concrete handler type and store it as a `Handler` trait object.
    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route::new(method, path, handler));
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` to the first matching route and return its response.
    ///
    /// Routes are tested in registration order. An unregistered path yields
    /// a `404 Not Found` JSON error; a registered path requested with an
    /// unregistered method yields `405 Method Not Allowed`.
    pub async fn route(&self, request: Request) -> Response {
        let path = normalize(request.path()).to_owned();

        let mut path_registered = false;
        for route in &self.routes {
            if route.path == path {
                if &route.method == request.method() {
                    let ctx = Context::new(request);
                    return (route.handler)(ctx).await;
                }
                path_registered = true;
            }
        }

        if path_registered {
            Response::error(StatusCode::MethodNotAllowed, "method not allowed")
        } else {
            Response::error(StatusCode::NotFound, "not found")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    #[test]
    fn router_starts_empty() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn router_len_increments_on_add() {
        let mut router = Router::new();
        router.get("/a", |_ctx| async { Response::new(StatusCode::Ok) });
        router.post("/b", |_ctx| async { Response::new(StatusCode::Ok) });
        assert_eq!(router.len(), 2);
        assert!(!router.is_empty());
    }

    #[tokio::test]
    async fn empty_router_returns_404() {
        let router = Router::new();
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn get_matches() {
        let mut router = Router::new();
        router.get("/hello", |_ctx| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/hello")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn wrong_method_on_registered_path_returns_405() {
        let mut router = Router::new();
        router.get("/hello", |_ctx| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("POST", "/hello")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn wrong_method_beats_404_even_with_other_routes() {
        let mut router = Router::new();
        router.get("/a", |_ctx| async { Response::new(StatusCode::Ok) });
        router.post("/predictions", |_ctx| async {
            Response::new(StatusCode::Ok)
        });
        let res = router.route(make_request("GET", "/predictions")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn trailing_slash_normalized() {
        let mut router = Router::new();
        router.get("/predictions", |_ctx| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/predictions/")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn unregistered_path_returns_404() {
        let mut router = Router::new();
        router.get("/hello", |_ctx| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/world")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", |_ctx| async { Response::new(StatusCode::Ok) });
        router.get("/path", |_ctx| async {
            Response::new(StatusCode::Created)
        });

        let res = router.route(make_request("GET", "/path")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn query_string_does_not_affect_matching() {
        let mut router = Router::new();
        router.get("/predictions", |_ctx| async { Response::new(StatusCode::Ok) });
        let res = router
            .route(make_request("GET", "/predictions?limit=2&offset=0"))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
    }
}
