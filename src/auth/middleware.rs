//! Bearer-token guard middleware for protected routes.

use std::pin::Pin;
use std::sync::Arc;

use crate::{
    Response, StatusCode,
    context::Context,
    middleware::{Middleware, Next},
};

use super::TokenSigner;

/// Middleware that verifies the `Authorization: Bearer <token>` header
/// before any downstream logic runs.
///
/// On success the authenticated [`Subject`](super::Subject) is inserted
/// into the context extensions and the request is forwarded. On failure the
/// chain is short-circuited with a `401` JSON error — the downstream
/// handler, and therefore the cache and ledger, are never touched.
pub struct BearerGuard {
    signer: Arc<TokenSigner>,
}

impl BearerGuard {
    /// Creates a guard that verifies tokens against the given signer.
    pub fn new(signer: Arc<TokenSigner>) -> Self {
        Self { signer }
    }
}

impl Middleware for BearerGuard {
    fn handle(
        &self,
        mut ctx: Context,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let signer = Arc::clone(&self.signer);
        Box::pin(async move {
            let header = ctx
                .request()
                .headers()
                .get("authorization")
                .map(str::to_owned);

            match signer.verify_bearer(header.as_deref()) {
                Ok(subject) => {
                    ctx.extensions_mut().insert(subject);
                    next.run(ctx).await
                }
                Err(e) => {
                    tracing::warn!(
                        path = %ctx.request().path(),
                        reason = %e,
                        "rejected unauthorized request"
                    );
                    Response::error(StatusCode::Unauthorized, e.to_string())
                }
            }
        })
    }
}
