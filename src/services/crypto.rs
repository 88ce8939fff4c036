// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device-local encryption for sensitive profile fields (address, phone).
//!
//! AES-256-GCM with a fresh random 96-bit nonce per call. The stored form is
//! `base64(nonce || ciphertext || tag)`, so it can live in TEXT columns and
//! string document fields unchanged.
//!
//! The key is 32 random bytes kept base64-encoded in a file next to the
//! database. It never leaves the device, so ciphertext copied from the remote
//! store that was produced on another device will not decrypt here.

use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

const KEY_LEN: usize = 32;

/// Encryption failures. Readers turn these into "value unavailable".
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("ciphertext is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("ciphertext too short ({0} bytes)")]
    Truncated(usize),

    #[error("ciphertext failed authentication")]
    Authentication,

    #[error("decrypted value is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("key store error: {0}")]
    KeyStore(String),

    #[error("encryption failed")]
    Seal,

    #[error("random number generator failed")]
    Rng,
}

/// Symmetric encryption with the device key. Cheap to clone.
#[derive(Clone)]
pub struct EncryptionService {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService").finish_non_exhaustive()
    }
}

impl EncryptionService {
    /// Load the key at `path`, creating it on first use.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let path = path.as_ref();
        let key = if path.exists() {
            let encoded = std::fs::read_to_string(path)
                .map_err(|e| CryptoError::KeyStore(format!("read {}: {e}", path.display())))?;
            let bytes = BASE64
                .decode(encoded.trim_end())
                .map_err(|e| CryptoError::KeyStore(format!("decode {}: {e}", path.display())))?;
            tracing::debug!(path = %path.display(), "Loaded device key");
            bytes
        } else {
            let bytes = generate_key()?;
            write_key_file(path, &BASE64.encode(&bytes))?;
            tracing::info!(path = %path.display(), "Created new device key");
            bytes
        };
        Self::from_key_bytes(&key)
    }

    /// Build from raw key material (must be 32 bytes).
    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::KeyStore(format!(
                "key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let unbound = UnboundKey::new(&AES_256_GCM, bytes)
            .map_err(|_| CryptoError::KeyStore("invalid key material".to_string()))?;
        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Fresh random key that only lives in memory.
    pub fn ephemeral() -> Result<Self, CryptoError> {
        Self::from_key_bytes(&generate_key()?)
    }

    /// Encrypt a UTF-8 string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::Rng)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Seal)?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(BASE64.encode(out))
    }

    /// Decrypt a value produced by `encrypt` with the same key.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let raw = BASE64.decode(ciphertext.trim())?;
        if raw.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CryptoError::Truncated(raw.len()));
        }

        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CryptoError::Truncated(raw.len()))?;
        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Authentication)?;

        Ok(String::from_utf8(plaintext.to_vec())?)
    }

    /// Encrypt an optional field, leaving `None` as `None`.
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, CryptoError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }
}

fn generate_key() -> Result<Vec<u8>, CryptoError> {
    let mut key = vec![0u8; KEY_LEN];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| CryptoError::Rng)?;
    Ok(key)
}

fn write_key_file(path: &Path, encoded: &str) -> Result<(), CryptoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CryptoError::KeyStore(format!("create {}: {e}", parent.display())))?;
    }
    std::fs::write(path, encoded)
        .map_err(|e| CryptoError::KeyStore(format!("write {}: {e}", path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| CryptoError::KeyStore(format!("chmod {}: {e}", path.display())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_with_unicode() {
        let crypto = EncryptionService::ephemeral().unwrap();
        let ct = crypto.encrypt("Calle Señor 12, 3º").unwrap();
        assert_ne!(ct, "Calle Señor 12, 3º");
        assert_eq!(crypto.decrypt(&ct).unwrap(), "Calle Señor 12, 3º");
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let crypto = EncryptionService::ephemeral().unwrap();
        assert_ne!(crypto.encrypt("same").unwrap(), crypto.encrypt("same").unwrap());
    }

    #[test]
    fn test_empty_string_encrypts() {
        let crypto = EncryptionService::ephemeral().unwrap();
        let ct = crypto.encrypt("").unwrap();
        assert_eq!(crypto.decrypt(&ct).unwrap(), "");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let crypto = EncryptionService::ephemeral().unwrap();
        assert!(matches!(crypto.decrypt("not base64!!"), Err(CryptoError::Encoding(_))));
        assert!(matches!(crypto.decrypt("AAAA"), Err(CryptoError::Truncated(3))));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let crypto = EncryptionService::ephemeral().unwrap();
        let mut raw = BASE64.decode(crypto.encrypt("555-0100").unwrap()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(matches!(
            crypto.decrypt(&BASE64.encode(raw)),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_wrong_key_length() {
        assert!(matches!(
            EncryptionService::from_key_bytes(&[0u8; 16]),
            Err(CryptoError::KeyStore(_))
        ));
    }
}
