// Asymmetric token signer/verifier issuing the two token classes described
// in the authentication core: short-lived access tokens and long-lived
// refresh tokens, both carrying the same claim shape.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::error_handling::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub sub: String,
    pub org_id: String,
    pub session_id: String,
    pub jti: String,
    pub token_type: TokenType,
}

pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenSigner {
    pub fn new(
        encoding_key: Arc<EncodingKey>,
        decoding_key: Arc<DecodingKey>,
        algorithm: Algorithm,
        issuer: String,
        audience: String,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            encoding_key,
            decoding_key,
            algorithm,
            issuer,
            audience,
            access_ttl,
            refresh_ttl,
        }
    }

    fn issue(
        &self,
        user_id: &str,
        org_id: &str,
        session_id: &str,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            sub: user_id.to_string(),
            org_id: org_id.to_string(),
            session_id: session_id.to_string(),
            jti: jti.clone(),
            token_type,
        };

        let header = Header::new(self.algorithm);
        let token = encode(&header, &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    pub fn issue_access_token(
        &self,
        user_id: &str,
        org_id: &str,
        session_id: &str,
    ) -> Result<IssuedToken> {
        self.issue(user_id, org_id, session_id, TokenType::Access, self.access_ttl)
    }

    pub fn issue_refresh_token(
        &self,
        user_id: &str,
        org_id: &str,
        session_id: &str,
    ) -> Result<IssuedToken> {
        self.issue(
            user_id,
            org_id,
            session_id,
            TokenType::Refresh,
            self.refresh_ttl,
        )
    }

    /// Validates signature, `exp`, `iss`, and `aud`. Any failure collapses to
    /// a single opaque result, never distinguishing which check failed. The
    /// caller picks the domain error that fits its own context (refresh vs.
    /// access-token validation use different kinds).
    pub fn verify(&self, token: &str, expected_type: TokenType) -> std::result::Result<Claims, ()> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.set_audience(&[self.audience.clone()]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|_| ())?;

        if data.claims.token_type != expected_type {
            return Err(());
        }

        Ok(data.claims)
    }
}
