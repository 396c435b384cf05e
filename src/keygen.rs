//! API key material generation.
//!
//! Token generation is a collaborator of the lifecycle manager: the manager
//! asks a [`KeyGenerator`] for fresh [`KeyMaterial`] on the first credential
//! request for an identity and never calls it again while that credential
//! lives. The hashed form is registered with the account store, the bearer
//! form goes to the credential store.

use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::secrets::Secret;

/// Prefix carried by every generated bearer secret.
pub const SECRET_PREFIX: &str = "esa_";

const SECRET_RANDOM_LEN: usize = 32;

/// Error type for key generation.
#[derive(Debug, Error)]
pub enum KeygenError {
    /// The generation routine failed before producing any material.
    #[error("key generation failed: {message}")]
    GenerationFailed { message: String },
}

/// Freshly generated credential material.
///
/// The two forms are derived from the same secret: `hashed_key` is what the
/// account store keeps for verification, `client_secret` is the bearer form
/// handed to the external service.
pub struct KeyMaterial {
    /// The plaintext bearer secret.
    pub client_secret: Secret,

    /// Hex-encoded hash of the secret, safe to persist outside the
    /// credential store.
    pub hashed_key: String,
}

/// Credential-generation collaborator.
///
/// Implementations must produce material that is unique per call; the
/// manager relies on the credential store, not the generator, for
/// idempotency.
pub trait KeyGenerator: Send + Sync {
    /// Generate key material for the external service identified by `slug`.
    fn generate(&self, slug: &str) -> Result<KeyMaterial, KeygenError>;
}

/// Default generator producing `esa_`-prefixed random secrets.
#[derive(Debug, Default)]
pub struct ApiKeyGenerator;

impl ApiKeyGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl KeyGenerator for ApiKeyGenerator {
    fn generate(&self, _slug: &str) -> Result<KeyMaterial, KeygenError> {
        const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut rng = rand::thread_rng();

        let random: String = (0..SECRET_RANDOM_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect();

        let secret = format!("{SECRET_PREFIX}{random}");
        let hashed_key = hex::encode(Sha256::digest(secret.as_bytes()));

        Ok(KeyMaterial {
            client_secret: Secret::new(secret),
            hashed_key,
        })
    }
}
