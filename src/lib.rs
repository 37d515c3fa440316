//! # irisgate
//!
//! An authenticated inference gateway over HTTP/1.1.
//!
//! Clients log in with a credential pair, receive a signed expiring token,
//! and submit 4-dimensional feature vectors for classification. Results are
//! memoized per distinct vector with single-flight protection, and every
//! newly computed prediction is durably appended to a SQLite-backed ledger
//! that can be paged in reverse-chronological order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use irisgate::config::GatewayConfig;
//! use irisgate::gateway::Gateway;
//! use irisgate::ledger::SqliteLedger;
//! use irisgate::model::ThresholdClassifier;
//! use irisgate::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::from_env();
//!     let ledger = Arc::new(SqliteLedger::open(&config.database_path).await?);
//!     let gateway = Gateway::new(&config, Arc::new(ThresholdClassifier), ledger);
//!     let router = Arc::new(gateway.router());
//!
//!     let server = Server::bind(&config.bind_addr).await?;
//!     server
//!         .run(move |req| {
//!             let router = Arc::clone(&router);
//!             async move { router.route(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

// ── HTTP transport ────────────────────────────────────────────────────────────
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Gateway core ──────────────────────────────────────────────────────────────
pub mod auth;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod ledger;
pub mod model;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use gateway::Gateway;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
