//! Access control — credential validation, token issuance, and the bearer guard.
//!
//! Login exchanges a username/password pair for a signed, expiring bearer
//! token ([`Authenticator`]). Protected routes sit behind
//! [`BearerGuard`](middleware::BearerGuard), which verifies the token's
//! signature and expiry before any business logic runs and injects the
//! authenticated [`Subject`] into the request context.
//!
//! Tokens are stateless: there is no revocation list, so validity is
//! decided entirely by the signature and expiry checks at verification time.

use std::sync::Arc;

use thiserror::Error;

pub mod middleware;
pub mod token;

pub use middleware::BearerGuard;
pub use token::TokenSigner;

/// Why an authentication or authorization attempt was rejected.
///
/// Every variant maps to HTTP 401 at the gateway boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Username or password mismatch. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing/ill-formed `Authorization` header, undecodable token, or bad signature.
    #[error("malformed or unsigned token")]
    Malformed,

    /// Structurally valid token whose expiry instant has passed.
    #[error("token expired")]
    Expired,
}

/// The authenticated principal extracted from a verified token.
///
/// Injected into the request context by the bearer guard; handlers read it
/// back out for audit logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub name: String,
}

/// Validates a fixed credential pair and issues signed tokens.
///
/// The single-pair credential store mirrors the deployment baseline; the
/// check is a plain comparison against the configured pair, and failure is
/// reported identically whichever field mismatched.
pub struct Authenticator {
    username: String,
    password: String,
    signer: Arc<TokenSigner>,
}

impl Authenticator {
    /// Creates an issuer for the given credential pair.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        signer: Arc<TokenSigner>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            signer,
        }
    }

    /// Validates the credential pair and returns a signed bearer token.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] when either field mismatches.
    /// Issuance itself has no side effects.
    pub fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        if username == self.username && password == self.password {
            Ok(self.signer.issue(username))
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}
