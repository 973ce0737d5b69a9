//! Request authentication as a linear sequence of gates.
//!
//! `Unauthenticated -> TokenPresent -> TokenValid -> TypeChecked -> Authenticated`.
//! Each gate either advances or rejects; every rejection looks the same to
//! the client.

use serde::Serialize;
use tracing::debug;

use super::token::{Claims, TokenKind, TokenService};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Identity attached to a request that passed every gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub username: String,
}

/// Which gate turned the request away. Internal only, never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoToken,
    InvalidToken,
    WrongTokenKind,
}

pub async fn authenticate_token(
    tokens: &TokenService,
    cookie: Option<&str>,
) -> Result<AuthenticatedUser, Rejection> {
    let token = token_present(cookie)?;
    let claims = token_valid(tokens, token).await?;
    let claims = type_checked(claims, TokenKind::AccessToken)?;
    Ok(AuthenticatedUser { username: claims.username })
}

fn token_present(cookie: Option<&str>) -> Result<&str, Rejection> {
    cookie.filter(|token| !token.is_empty()).ok_or(Rejection::NoToken)
}

async fn token_valid(tokens: &TokenService, token: &str) -> Result<Claims, Rejection> {
    tokens.verify(token).await.ok_or(Rejection::InvalidToken)
}

fn type_checked(claims: Claims, expected: TokenKind) -> Result<Claims, Rejection> {
    if claims.kind == expected {
        Ok(claims)
    } else {
        debug!("Got {} where {} is required", claims.kind, expected);
        Err(Rejection::WrongTokenKind)
    }
}
