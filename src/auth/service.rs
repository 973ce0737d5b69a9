use std::sync::Arc;
use tracing::{error, info, warn};

use super::password::PasswordService;
use super::token::{Identity, TokenKind, TokenPair, TokenService};
use crate::db::models::Credential;
use crate::db::operations::UserStore;
use crate::error::{AppError, AuthError};

const PASSWORD_SPECIALS: &str = "#?!@$%^&*-";
const PASSWORD_RULES: &str = "Password must contain at least 8 characters and a combination of \
     lowercase, uppercase, number and a special character";

/// Result of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub tokens: TokenPair,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    passwords: PasswordService,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, passwords: PasswordService, tokens: TokenService) -> Self {
        Self { users, passwords, tokens }
    }

    /// Computes the dummy hash up front so the first unknown-user attempt
    /// does not pay for it.
    pub async fn warm_up(&self) {
        let _ = self.passwords.dummy_hash().await;
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<Identity, AppError> {
        validate_username(username)?;
        validate_password(password)?;

        let hash = self.passwords.hash(password).await.into_result().map_err(|_| {
            AppError::InternalError("password hashing failed".into())
        })?;

        self.users.create(&Credential::new(username, hash)).await.map_err(|e| {
            warn!("Registration failed for {}: {}", username, e);
            e
        })?;

        info!("Registered user {}", username);
        Ok(Identity::new(username))
    }

    /// Checks a username/password pair.
    ///
    /// Runs exactly one password verification whatever happens, against the
    /// dummy hash when the user does not exist or cannot be looked up, so both
    /// failure paths cost the same.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Credential, AppError> {
        if username.is_empty() || password.is_empty() {
            return Err(AppError::ValidationError("username and password are required".into()));
        }

        let lookup = self.users.find_by_username(username).await;
        let stored_hash = match &lookup {
            Ok(Some(credential)) => credential.password_hash.as_str(),
            _ => self.passwords.dummy_hash().await,
        };
        let valid = self.passwords.verify(stored_hash, password).await;

        match lookup {
            Ok(Some(credential)) if valid => Ok(credential),
            Ok(Some(_)) => {
                warn!("Rejected login for {}: wrong password", username);
                Err(AuthError::InvalidCredentials.into())
            }
            Ok(None) => {
                warn!("Rejected login for {}: unknown user", username);
                Err(AuthError::InvalidCredentials.into())
            }
            Err(e) => {
                error!("User lookup failed during login: {}", e);
                Err(e.into())
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AppError> {
        let credential = self.authenticate(username, password).await?;
        self.issue_session(Identity::new(credential.username)).await
    }

    /// Trades a valid refresh token for a brand-new access/refresh pair.
    ///
    /// The presented token is not revoked: it keeps working until it expires.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<Session, AppError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthorized)?;

        let claims = self
            .tokens
            .verify_kind(token, TokenKind::RefreshToken)
            .await
            .ok_or(AuthError::InvalidToken)?;

        let credential = self
            .users
            .find_by_username(&claims.username)
            .await?
            .ok_or_else(|| {
                warn!("Refresh token for unknown user {}", claims.username);
                AuthError::Unauthorized
            })?;

        self.issue_session(Identity::new(credential.username)).await
    }

    async fn issue_session(&self, identity: Identity) -> Result<Session, AppError> {
        let tokens = self
            .tokens
            .issue_pair(&identity)
            .await
            .ok_or_else(|| AppError::InternalError("token issuance failed".into()))?;
        Ok(Session { identity, tokens })
    }
}

/// Email-shaped: one `@`, a non-empty local part and a dotted domain.
pub fn validate_username(username: &str) -> Result<(), AppError> {
    let invalid = || AppError::ValidationError("Invalid Email".into());

    if username.len() > 254 || username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }
    let (local, domain) = username.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    let length = password.chars().count();
    let ok = (8..=128).contains(&length)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if ok {
        Ok(())
    } else {
        Err(AppError::ValidationError(PASSWORD_RULES.into()))
    }
}
