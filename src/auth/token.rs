use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};

use super::keys::KeyStore;
use crate::config::JwtConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AccessToken,
    RefreshToken,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::AccessToken => "access_token",
            TokenKind::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Identity a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies stateless RS256 tokens.
///
/// Nothing is recorded server-side, so a refresh token stays usable until it
/// expires even after it has been rotated.
#[derive(Clone)]
pub struct TokenService {
    keys: KeyStore,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(keys: KeyStore, config: &JwtConfig) -> Self {
        Self {
            keys,
            access_ttl: Duration::seconds(config.access_token_ttl_secs),
            refresh_ttl: Duration::seconds(config.refresh_token_ttl_secs),
        }
    }

    pub async fn issue_access(&self, identity: &Identity) -> Option<String> {
        self.issue(identity, TokenKind::AccessToken).await
    }

    pub async fn issue_refresh(&self, identity: &Identity) -> Option<String> {
        self.issue(identity, TokenKind::RefreshToken).await
    }

    pub async fn issue_pair(&self, identity: &Identity) -> Option<TokenPair> {
        let access_token = self.issue_access(identity).await?;
        let refresh_token = self.issue_refresh(identity).await?;
        Some(TokenPair { access_token, refresh_token })
    }

    async fn issue(&self, identity: &Identity, kind: TokenKind) -> Option<String> {
        let this = self.clone();
        let username = identity.username.clone();
        match tokio::task::spawn_blocking(move || this.sign(&username, kind, Utc::now())).await {
            Ok(token) => token,
            Err(e) => {
                error!("Token signing task panicked: {}", e);
                None
            }
        }
    }

    fn sign(&self, username: &str, kind: TokenKind, issued_at: DateTime<Utc>) -> Option<String> {
        let ttl = match kind {
            TokenKind::AccessToken => self.access_ttl,
            TokenKind::RefreshToken => self.refresh_ttl,
        };
        let claims = Claims {
            username: username.to_string(),
            kind,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, self.keys.encoding())
            .map_err(|e| error!("Failed to sign {}: {}", kind, e))
            .ok()
    }

    /// Signature and expiry check. Any failure is `None`; the cause is only logged.
    ///
    /// A `Some` says nothing about the token kind. Callers that need a
    /// particular kind must use [`TokenService::verify_kind`] or check
    /// `claims.kind` themselves.
    pub async fn verify(&self, token: &str) -> Option<Claims> {
        let this = self.clone();
        let token = token.to_owned();
        match tokio::task::spawn_blocking(move || this.decode(&token)).await {
            Ok(claims) => claims,
            Err(e) => {
                error!("Token verification task panicked: {}", e);
                None
            }
        }
    }

    pub async fn verify_kind(&self, token: &str, expected: TokenKind) -> Option<Claims> {
        let claims = self.verify(token).await?;
        if claims.kind != expected {
            debug!("Rejected {} presented as {}", claims.kind, expected);
            return None;
        }
        Some(claims)
    }

    fn decode(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;

        decode::<Claims>(token, self.keys.decoding(), &validation)
            .map(|data| data.claims)
            .map_err(|e| debug!("Token rejected: {}", e))
            .ok()
    }
}
