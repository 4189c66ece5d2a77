use anyhow::Result;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Identity claim carried inside a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    /// Absolute expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Issues and verifies self-contained signed session tokens.
///
/// A token is three URL-safe base64 segments joined by `.`: a fixed JSON
/// header, the claims payload, and an HMAC-SHA256 over the first two segments
/// keyed by the server secret. The format resembles a JWT but makes no
/// standards claim; no external party verifies these tokens.
///
/// Tokens are stateless: there is no server-side denylist, so a token stays
/// valid to any holder until it expires. Logout only clears the client cookie.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token for `user_id` valid for `ttl_secs` from now.
    pub fn issue(&self, user_id: Uuid, username: &str, ttl_secs: i64) -> Result<String> {
        self.issue_at(user_id, username, ttl_secs, chrono::Utc::now().timestamp())
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    fn issue_at(&self, user_id: Uuid, username: &str, ttl_secs: i64, now: i64) -> Result<String> {
        let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            exp: now + ttl_secs,
        };

        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature_b64 = URL_SAFE_NO_PAD.encode(self.sign(&header_b64, &payload_b64)?);

        Ok(format!("{header_b64}.{payload_b64}.{signature_b64}"))
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (header_b64, payload_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(TokenError::Malformed),
            };

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;

        // verify_slice compares in constant time
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::BadSignature)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if now > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, header_b64: &str, payload_b64: &str) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| anyhow::anyhow!("hmac init failed: {}", e))?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(&b"test-secret"[..])
    }

    #[test]
    fn issue_then_verify() {
        let s = signer();
        let id = Uuid::new_v4();
        let token = s.issue(id, "alice", 3600).unwrap();
        let claims = s.verify(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn ttl_boundary() {
        let s = signer();
        let now = 1_700_000_000;
        let ttl = 3600;
        let token = s.issue_at(Uuid::new_v4(), "alice", ttl, now).unwrap();

        assert!(s.verify_at(&token, now + ttl - 1).is_ok());
        // exp is inclusive: valid through the expiry second itself
        assert!(s.verify_at(&token, now + ttl).is_ok());
        assert_eq!(
            s.verify_at(&token, now + ttl + 1),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let s = signer();
        let token = s.issue(Uuid::new_v4(), "alice", 3600).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        // Flip one character of the payload segment.
        let mut payload: Vec<u8> = parts[1].bytes().collect();
        payload[0] = if payload[0] == b'A' { b'B' } else { b'A' };
        let tampered = format!(
            "{}.{}.{}",
            parts[0],
            String::from_utf8(payload).unwrap(),
            parts[2]
        );

        assert_eq!(s.verify(&tampered), Err(TokenError::BadSignature));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = signer().issue(Uuid::new_v4(), "alice", 3600).unwrap();
        let other = TokenSigner::new(&b"other-secret"[..]);
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn malformed_tokens() {
        let s = signer();
        assert_eq!(s.verify(""), Err(TokenError::Malformed));
        assert_eq!(s.verify("a.b"), Err(TokenError::Malformed));
        assert_eq!(s.verify("a.b.c.d"), Err(TokenError::Malformed));
        // three segments but invalid base64 signature
        assert_eq!(s.verify("a.b.!!!"), Err(TokenError::Malformed));
    }

    #[test]
    fn expired_token_names_the_right_error() {
        let s = signer();
        let now = 1_700_000_000;
        let token = s.issue_at(Uuid::new_v4(), "bob", 60, now).unwrap();
        assert_eq!(
            s.verify_at(&token, now + 120),
            Err(TokenError::Expired)
        );
    }
}
