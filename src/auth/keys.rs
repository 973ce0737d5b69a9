use jsonwebtoken::{DecodingKey, EncodingKey};
use std::fs;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::JwtConfig;
use crate::error::AppError;

/// RS256 signing material, loaded once at startup and shared read-only.
#[derive(Clone)]
pub struct KeyStore {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl KeyStore {
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, AppError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem).map_err(|e| {
            error!("Invalid RSA private key: {}", e);
            AppError::ConfigError(format!("invalid JWT private key: {}", e))
        })?;
        let decoding = DecodingKey::from_rsa_pem(public_pem).map_err(|e| {
            error!("Invalid RSA public key: {}", e);
            AppError::ConfigError(format!("invalid JWT public key: {}", e))
        })?;

        Ok(Self {
            encoding: Arc::new(encoding),
            decoding: Arc::new(decoding),
        })
    }

    /// Inline PEM from configuration wins over a key file path.
    pub fn from_config(config: &JwtConfig) -> Result<Self, AppError> {
        let private_pem = load_pem(
            "private",
            config.private_key.as_deref(),
            config.private_key_path.as_deref(),
        )?;
        let public_pem = load_pem(
            "public",
            config.public_key.as_deref(),
            config.public_key_path.as_deref(),
        )?;

        let keys = Self::from_pem(&private_pem, &public_pem)?;
        info!("JWT signing keys loaded");
        Ok(keys)
    }

    pub(crate) fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

fn load_pem(kind: &str, inline: Option<&str>, path: Option<&str>) -> Result<Vec<u8>, AppError> {
    if let Some(pem) = inline.filter(|pem| !pem.trim().is_empty()) {
        // Env vars often carry PEM with escaped newlines.
        return Ok(pem.replace("\\n", "\n").into_bytes());
    }

    match path.filter(|p| !p.is_empty()) {
        Some(path) => fs::read(path).map_err(|e| {
            AppError::ConfigError(format!("cannot read JWT {} key from {}: {}", kind, path, e))
        }),
        None => Err(AppError::ConfigError(format!("JWT {} key is not configured", kind))),
    }
}
