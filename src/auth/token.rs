//! Signed, expiring bearer tokens (HS256).
//!
//! Tokens use the compact three-segment JWT layout
//! `base64url(header).base64url(claims).base64url(signature)` with an
//! HMAC-SHA-256 signature over the first two segments. Claims carry only
//! the subject and the Unix expiry instant; validity is decided entirely by
//! the signature and expiry checks — no server-side state.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::{AuthError, Subject};

type HmacSha256 = Hmac<Sha256>;

/// Fixed JOSE header for every token: HS256, JWT type.
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Issues and verifies HS256-signed bearer tokens with a server-held secret.
///
/// # Examples
///
/// ```
/// use irisgate::auth::TokenSigner;
///
/// let signer = TokenSigner::new(b"server-secret", 3600);
/// let token = signer.issue("admin");
/// assert_eq!(signer.verify(&token).unwrap().name, "admin");
/// ```
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl TokenSigner {
    /// Creates a signer with the given secret and token lifetime in seconds.
    pub fn new(secret: impl Into<Vec<u8>>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs,
        }
    }

    /// Issues a signed token for `subject` expiring `ttl_secs` from now.
    pub fn issue(&self, subject: &str) -> String {
        let claims = Claims {
            sub: subject.to_owned(),
            exp: (Utc::now() + Duration::seconds(self.ttl_secs)).timestamp(),
        };
        // String + i64 claims cannot fail to serialize.
        let claims_json = serde_json::to_string(&claims).unwrap();

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(&claims_json)
        );
        let signature = self.sign(signing_input.as_bytes());

        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
    }

    /// Verifies a token's signature and expiry, returning its subject.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Malformed`] — wrong segment count, undecodable
    ///   segments, unparseable claims, or a signature mismatch.
    /// - [`AuthError::Expired`] — signature is valid but `exp` has passed.
    pub fn verify(&self, token: &str) -> Result<Subject, AuthError> {
        let mut segments = token.split('.');
        let (header, claims, signature) = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(h), Some(c), Some(s), None) => (h, c, s),
            _ => return Err(AuthError::Malformed),
        };

        let signing_input = format!("{header}.{claims}");
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::Malformed)?;

        // Constant-time comparison via the MAC's own verifier.
        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::Malformed)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims)
            .map_err(|_| AuthError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| AuthError::Malformed)?;

        if Utc::now().timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(Subject { name: claims.sub })
    }

    /// Extracts and verifies the token from an `Authorization: Bearer <token>` header.
    ///
    /// A missing header or a non-Bearer scheme is [`AuthError::Malformed`].
    pub fn verify_bearer(&self, header: Option<&str>) -> Result<Subject, AuthError> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(AuthError::Malformed)?;
        self.verify(token.trim())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.secret).unwrap()
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_verify_round_trip() {
        let signer = TokenSigner::new(b"secret", 60);
        let token = signer.issue("admin");
        assert_eq!(signer.verify(&token).unwrap().name, "admin");
    }

    #[test]
    fn expired_token_rejected() {
        let signer = TokenSigner::new(b"secret", -1);
        let token = signer.issue("admin");
        assert_eq!(signer.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn tampered_claims_rejected() {
        let signer = TokenSigner::new(b"secret", 60);
        let token = signer.issue("admin");

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(r#"{"sub":"root","exp":9999999999}"#);
        parts[1] = &forged;
        let forged_token = parts.join(".");

        assert_eq!(signer.verify(&forged_token), Err(AuthError::Malformed));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = TokenSigner::new(b"secret-a", 60).issue("admin");
        let verifier = TokenSigner::new(b"secret-b", 60);
        assert_eq!(verifier.verify(&token), Err(AuthError::Malformed));
    }

    #[test]
    fn garbage_rejected() {
        let signer = TokenSigner::new(b"secret", 60);
        assert_eq!(signer.verify("not-a-token"), Err(AuthError::Malformed));
        assert_eq!(signer.verify("a.b"), Err(AuthError::Malformed));
        assert_eq!(signer.verify("a.b.c.d"), Err(AuthError::Malformed));
    }

    #[test]
    fn bearer_header_extraction() {
        let signer = TokenSigner::new(b"secret", 60);
        let token = signer.issue("admin");

        let subject = signer
            .verify_bearer(Some(&format!("Bearer {token}")))
            .unwrap();
        assert_eq!(subject.name, "admin");

        assert_eq!(signer.verify_bearer(None), Err(AuthError::Malformed));
        assert_eq!(
            signer.verify_bearer(Some(&token)),
            Err(AuthError::Malformed)
        );
        assert_eq!(
            signer.verify_bearer(Some("Basic dXNlcjpwYXNz")),
            Err(AuthError::Malformed)
        );
    }
}
