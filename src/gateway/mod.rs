//! Gateway composition — wires auth, cache, model, and ledger into routes.
//!
//! Request cycle for the three routes:
//!
//! | Route | Pipeline |
//! |---|---|
//! | `POST /login` | logger → credential check → token |
//! | `POST /predict` | logger → bearer guard → parse features → cache resolve → (miss) ledger append |
//! | `GET /predictions` | logger → bearer guard → validate paging → ledger list |
//!
//! Validation errors are caught here and never reach the cache; auth errors
//! short-circuit in the guard before any cache or ledger access; a storage
//! failure on the miss path is surfaced as 500 even though the cache
//! already holds the computed class (documented divergence — the class is a
//! pure function of the input, so the retained entry is always safe).

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    Request, Response, Router, StatusCode,
    auth::{Authenticator, BearerGuard, Subject, TokenSigner},
    cache::SingleFlightCache,
    config::GatewayConfig,
    context::Context,
    ledger::PredictionLedger,
    middleware::{RequestLogger, from_middleware, stack},
    model::{Classifier, FeatureVector},
};

/// Client input rejected before any business logic ran. Mapped to HTTP 400.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid {param} parameter: {value:?}")]
    Paging { param: &'static str, value: String },
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// The assembled inference gateway.
///
/// Owns the cache and holds the model and ledger collaborators; construct
/// one with [`Gateway::new`] and mount it with [`Gateway::router`].
pub struct Gateway {
    authenticator: Authenticator,
    signer: Arc<TokenSigner>,
    cache: SingleFlightCache,
    model: Arc<dyn Classifier>,
    ledger: Arc<dyn PredictionLedger>,
}

impl Gateway {
    /// Builds a gateway from configuration and its two collaborators.
    pub fn new(
        config: &GatewayConfig,
        model: Arc<dyn Classifier>,
        ledger: Arc<dyn PredictionLedger>,
    ) -> Arc<Self> {
        let signer = Arc::new(TokenSigner::new(
            config.token_secret.as_bytes(),
            config.token_ttl_secs,
        ));
        let authenticator = Authenticator::new(
            config.username.as_str(),
            config.password.as_str(),
            Arc::clone(&signer),
        );

        Arc::new(Self {
            authenticator,
            signer,
            cache: SingleFlightCache::new(),
            model,
            ledger,
        })
    }

    /// Builds the route table: `/login` open, `/predict` and `/predictions`
    /// behind the bearer guard, request logging on everything.
    pub fn router(self: &Arc<Self>) -> Router {
        let mut router = Router::new();
        let logger = from_middleware(Arc::new(RequestLogger));
        let guard = from_middleware(Arc::new(BearerGuard::new(Arc::clone(&self.signer))));

        let gw = Arc::clone(self);
        router.post(
            "/login",
            stack(vec![logger.clone()], move |ctx: Context| {
                let gw = Arc::clone(&gw);
                async move { gw.login(ctx).await }
            }),
        );

        let gw = Arc::clone(self);
        router.post(
            "/predict",
            stack(vec![logger.clone(), guard.clone()], move |ctx: Context| {
                let gw = Arc::clone(&gw);
                async move { gw.predict(ctx).await }
            }),
        );

        let gw = Arc::clone(self);
        router.get(
            "/predictions",
            stack(vec![logger, guard], move |ctx: Context| {
                let gw = Arc::clone(&gw);
                async move { gw.predictions(ctx).await }
            }),
        );

        router
    }

    /// `POST /login` — exchange the credential pair for a bearer token.
    async fn login(&self, ctx: Context) -> Response {
        let body: LoginRequest = match ctx.json() {
            Ok(body) => body,
            Err(e) => {
                return Response::error(
                    StatusCode::BadRequest,
                    format!("invalid request body: {e}"),
                );
            }
        };

        match self.authenticator.login(&body.username, &body.password) {
            Ok(token) => Response::json(StatusCode::Ok, &serde_json::json!({ "token": token })),
            Err(e) => Response::error(StatusCode::Unauthorized, e.to_string()),
        }
    }

    /// `POST /predict` — resolve a feature vector to a class, recording
    /// first resolutions in the ledger.
    async fn predict(&self, ctx: Context) -> Response {
        let features: FeatureVector = match ctx.json() {
            Ok(features) => features,
            Err(e) => {
                return Response::error(
                    StatusCode::BadRequest,
                    format!("invalid feature payload: {e}"),
                );
            }
        };

        let subject = ctx
            .extensions()
            .get::<Subject>()
            .map(|s| s.name.clone())
            .unwrap_or_default();

        let resolution = match self.cache.resolve(&features, self.model.as_ref()).await {
            Ok(resolution) => resolution,
            Err(e) => {
                error!(error = %e, "model invocation failed");
                return Response::error(StatusCode::InternalServerError, "model invocation failed");
            }
        };

        if resolution.hit {
            debug!(subject = %subject, class = resolution.class, "cache hit");
        } else {
            // This request owns the key's first resolution, so it alone
            // appends the audit record. A failed append keeps the cache
            // entry: the class is re-derivable, but the client must see
            // the storage failure.
            if let Err(e) = self.ledger.append(&features, resolution.class).await {
                error!(error = %e, "failed to persist prediction");
                return Response::error(
                    StatusCode::InternalServerError,
                    "failed to persist prediction",
                );
            }
            info!(subject = %subject, class = resolution.class, "prediction computed and recorded");
        }

        Response::json(
            StatusCode::Ok,
            &serde_json::json!({ "predicted_class": resolution.class }),
        )
    }

    /// `GET /predictions` — page the ledger, newest first.
    async fn predictions(&self, ctx: Context) -> Response {
        let (limit, offset) = match paging(ctx.request()) {
            Ok(paging) => paging,
            Err(e) => return Response::error(StatusCode::BadRequest, e.to_string()),
        };

        match self.ledger.list(limit, offset).await {
            Ok(records) => Response::json(StatusCode::Ok, &records),
            Err(e) => {
                error!(error = %e, "failed to read prediction ledger");
                Response::error(StatusCode::InternalServerError, "failed to read predictions")
            }
        }
    }
}

/// Parses `limit`/`offset` query parameters, applying the defaults 10 and 0.
///
/// Anything that is not a non-negative integer is a client error — negative
/// values are rejected, not clamped.
fn paging(request: &Request) -> Result<(u32, u32), ValidationError> {
    let parse = |param: &'static str, default: u32| -> Result<u32, ValidationError> {
        match request.query_param(param) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ValidationError::Paging {
                param,
                value: raw.to_owned(),
            }),
        }
    };

    Ok((parse("limit", 10)?, parse("offset", 0)?))
}
