//! Stateless session tokens.
//!
//! A token is `base64url(nonce || AES-256-GCM(json{uid, name}) || tag)`
//! without padding. Nothing is stored server-side: the middleware decrypts the
//! token on every request and checks it against the `X-User-ID` header.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Session;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token payload is malformed")]
    MalformedPayload,

    #[error("token encryption failed")]
    Encrypt,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    uid: i64,
    name: String,
}

/// Encrypts and decrypts session tokens.
///
/// New tokens are always sealed with the current key. Retired keys are only
/// tried on decode, so a rotated deployment keeps accepting tokens issued
/// before the rotation until the retired secret is dropped from config.
#[derive(Clone)]
pub struct TokenCodec {
    current: Aes256Gcm,
    retired: Vec<Aes256Gcm>,
}

impl TokenCodec {
    pub fn new(secret: &str, retired: &[String]) -> Self {
        Self {
            current: cipher_for(secret),
            retired: retired.iter().map(|s| cipher_for(s)).collect(),
        }
    }

    pub fn encode(&self, user_id: i64, name: &str) -> Result<String, TokenError> {
        let plain = serde_json::to_vec(&Payload {
            uid: user_id,
            name: name.to_string(),
        })
        .map_err(|_| TokenError::Encrypt)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .current
            .encrypt(Nonce::from_slice(&nonce), plain.as_slice())
            .map_err(|_| TokenError::Encrypt)?;

        let mut raw = Vec::with_capacity(NONCE_LEN + sealed.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    pub fn decode(&self, token: &str) -> Result<Session, TokenError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| TokenError::InvalidToken)?;
        if raw.len() < NONCE_LEN {
            return Err(TokenError::InvalidToken);
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);

        let plain = std::iter::once(&self.current)
            .chain(self.retired.iter())
            .find_map(|cipher| cipher.decrypt(nonce, sealed).ok())
            .ok_or(TokenError::InvalidToken)?;

        let payload: Payload =
            serde_json::from_slice(&plain).map_err(|_| TokenError::MalformedPayload)?;
        Ok(Session {
            user_id: payload.uid,
            name: payload.name,
        })
    }

    #[cfg(test)]
    fn seal_raw(&self, plain: &[u8]) -> String {
        let nonce = [7u8; NONCE_LEN];
        let sealed = self
            .current
            .encrypt(Nonce::from_slice(&nonce), plain)
            .expect("encrypt");
        let mut raw = nonce.to_vec();
        raw.extend_from_slice(&sealed);
        URL_SAFE_NO_PAD.encode(raw)
    }
}

/// A 64-char hex secret is used as the raw key; anything else is hashed.
fn key_bytes(secret: &str) -> [u8; 32] {
    let mut key = [0u8; 32];
    if secret.len() == 64 && hex::decode_to_slice(secret, &mut key).is_ok() {
        return key;
    }
    key.copy_from_slice(&Sha256::digest(secret.as_bytes()));
    key
}

fn cipher_for(secret: &str) -> Aes256Gcm {
    let key = key_bytes(secret);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))
}
