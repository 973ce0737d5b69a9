//! Credential hashing with Argon2id, a server-wide salt and a pepper.
//!
//! The salt and the pepper are algorithm inputs. The salt is encoded in the
//! PHC string like any Argon2 salt, the pepper is never stored, so rotating
//! it invalidates every hash produced before.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, warn};

use crate::config::HashConfig;

/// Outcome of [`PasswordService::hash`]. Exactly one side is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResult {
    pub hash: Option<String>,
    pub error: Option<HashFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFailure {
    /// Salt or secret missing/malformed, or the hasher itself failed.
    InternalError,
}

impl HashResult {
    fn ok(hash: String) -> Self {
        Self { hash: Some(hash), error: None }
    }

    fn internal_error() -> Self {
        Self { hash: None, error: Some(HashFailure::InternalError) }
    }

    pub fn into_result(self) -> Result<String, HashFailure> {
        match (self.hash, self.error) {
            (Some(hash), None) => Ok(hash),
            (_, error) => Err(error.unwrap_or(HashFailure::InternalError)),
        }
    }
}

#[derive(Clone)]
struct Material {
    salt: Option<Arc<[u8]>>,
    secret: Option<Arc<[u8]>>,
    params: Option<Params>,
}

impl Material {
    fn hasher(&self) -> Result<Argon2<'_>, String> {
        let secret = self.secret.as_deref().ok_or("hash secret is not configured")?;
        let params = self.params.clone().ok_or("invalid Argon2 parameters")?;
        Argon2::new_with_secret(secret, Algorithm::Argon2id, Version::V0x13, params)
            .map_err(|e| e.to_string())
    }

    fn hash(&self, plaintext: &[u8]) -> Result<String, String> {
        let salt = self.salt.as_deref().ok_or("hash salt is not configured")?;
        let salt = SaltString::encode_b64(salt).map_err(|e| e.to_string())?;
        let hasher = self.hasher()?;
        hasher
            .hash_password(plaintext, &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| e.to_string())
    }

    fn verify(&self, hash: &str, plaintext: &[u8]) -> Result<bool, String> {
        let parsed = PasswordHash::new(hash).map_err(|e| e.to_string())?;
        let hasher = self.hasher()?;
        match hasher.verify_password(plaintext, &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Whether `hash` is an Argon2id PHC string with the same costs as `live`.
fn same_cost(hash: &str, live: &Params) -> bool {
    PasswordHash::new(hash)
        .ok()
        .filter(|parsed| parsed.algorithm == Algorithm::Argon2id.ident())
        .and_then(|parsed| Params::try_from(&parsed).ok())
        .map_or(false, |params| {
            params.m_cost() == live.m_cost()
                && params.t_cost() == live.t_cost()
                && params.p_cost() == live.p_cost()
        })
}

#[derive(Clone)]
pub struct PasswordService {
    material: Material,
    dummy_hash: Arc<OnceCell<String>>,
}

impl PasswordService {
    pub fn new(config: &HashConfig) -> Self {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| error!("Invalid Argon2 parameters: {}", e))
            .ok();

        let to_bytes = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| Arc::<[u8]>::from(v.as_bytes()))
        };

        let dummy_hash = Arc::new(OnceCell::new());
        if let Some(hash) = config.dummy_hash.as_deref().filter(|h| !h.is_empty()) {
            match &params {
                Some(live) if same_cost(hash, live) => {
                    let _ = dummy_hash.set(hash.to_string());
                }
                _ => warn!("Configured dummy hash does not match the live Argon2 parameters, ignoring it"),
            }
        }

        Self {
            material: Material {
                salt: to_bytes(&config.salt),
                secret: to_bytes(&config.secret),
                params,
            },
            dummy_hash,
        }
    }

    /// Hash `plaintext`. Never panics or propagates: failures are logged and
    /// reported through [`HashResult::error`].
    pub async fn hash(&self, plaintext: &str) -> HashResult {
        let material = self.material.clone();
        let plaintext = plaintext.to_owned();

        match tokio::task::spawn_blocking(move || material.hash(plaintext.as_bytes())).await {
            Ok(Ok(hash)) => HashResult::ok(hash),
            Ok(Err(e)) => {
                error!("Failed to hash password: {}", e);
                HashResult::internal_error()
            }
            Err(e) => {
                error!("Password hash task panicked: {}", e);
                HashResult::internal_error()
            }
        }
    }

    /// `true` only when `plaintext` matches `hash` under the current secret.
    pub async fn verify(&self, hash: &str, plaintext: &str) -> bool {
        let material = self.material.clone();
        let hash = hash.to_owned();
        let plaintext = plaintext.to_owned();

        match tokio::task::spawn_blocking(move || material.verify(&hash, plaintext.as_bytes())).await {
            Ok(Ok(valid)) => valid,
            Ok(Err(e)) => {
                error!("Password verification failed: {}", e);
                false
            }
            Err(e) => {
                error!("Password verify task panicked: {}", e);
                false
            }
        }
    }

    /// A hash with the live parameters, verified against when there is no
    /// stored hash so unknown users cost the same as wrong passwords.
    pub async fn dummy_hash(&self) -> &str {
        let hash = self
            .dummy_hash
            .get_or_init(|| async {
                let filler: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(24)
                    .map(char::from)
                    .collect();
                match self.hash(&filler).await.into_result() {
                    Ok(hash) => hash,
                    Err(_) => {
                        warn!("Could not compute dummy hash, unknown-user checks will be cheaper");
                        String::new()
                    }
                }
            })
            .await;
        hash.as_str()
    }
}
