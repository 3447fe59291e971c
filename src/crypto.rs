//! API key encryption using AES-256-GCM.
//!
//! Tenant API keys are stored encrypted at rest with additional authenticated
//! data (AAD) binding the ciphertext to the tenant it belongs to.

#![allow(deprecated)]

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION_ENCRYPTED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_ENCRYPTED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;

/// Crypto error types
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("empty ciphertext")]
    EmptyCiphertext,
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingKey(Vec<u8>);

/// Type alias for crypto keys
pub type CryptoKey = ZeroizingKey;

impl CryptoKey {
    /// Create a new crypto key from bytes
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::EncryptionFailed(
                "invalid key length: expected 32 bytes".to_string(),
            ));
        }
        Ok(ZeroizingKey(bytes))
    }

    /// Get the key as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Encrypt bytes using AES-256-GCM
pub fn encrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // Versioned wire format: version byte, nonce, ciphertext+tag
    let mut result = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
    result.push(VERSION_ENCRYPTED);
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);

    Ok(result)
}

/// Decrypt bytes using AES-256-GCM
pub fn decrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() {
        return Err(CryptoError::EmptyCiphertext);
    }

    // Legacy plaintext payloads carry no version marker
    if ciphertext[0] != VERSION_ENCRYPTED {
        return Ok(ciphertext.to_vec());
    }

    if ciphertext.len() < MIN_ENCRYPTED_LEN {
        return Err(CryptoError::InvalidFormat);
    }

    let nonce = Nonce::from_slice(&ciphertext[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let tag_and_ct = &ciphertext[VERSION_FIELD_LEN + NONCE_LEN..];

    debug_assert!(tag_and_ct.len() >= TAG_LEN);

    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: tag_and_ct,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Determine if a payload is using the encrypted format
pub fn is_encrypted_payload(ciphertext: &[u8]) -> bool {
    ciphertext.len() >= MIN_ENCRYPTED_LEN && ciphertext[0] == VERSION_ENCRYPTED
}

fn tenant_aad(tenant_id: Uuid, base_url: &str) -> String {
    format!("{}|{}", tenant_id, base_url)
}

/// Encrypt a tenant's n8n API key, binding the ciphertext to the tenant
/// identity and instance URL.
pub fn encrypt_tenant_api_key(
    key: &CryptoKey,
    tenant_id: Uuid,
    base_url: &str,
    api_key: &str,
) -> Result<Vec<u8>, CryptoError> {
    let aad = tenant_aad(tenant_id, base_url);
    encrypt_bytes(key, aad.as_bytes(), api_key.as_bytes())
}

/// Decrypt a tenant's stored n8n API key.
pub fn decrypt_tenant_api_key(
    key: &CryptoKey,
    tenant_id: Uuid,
    base_url: &str,
    ciphertext: &[u8],
) -> Result<String, CryptoError> {
    let aad = tenant_aad(tenant_id, base_url);
    let bytes = decrypt_bytes(key, aad.as_bytes(), ciphertext)?;
    String::from_utf8(bytes)
        .map_err(|e| CryptoError::DecryptionFailed(format!("invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CryptoKey {
        CryptoKey::new(vec![0u8; 32]).expect("valid test key")
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key();
        let aad = b"test-aad";
        let plaintext = b"secret message";

        let encrypted = encrypt_bytes(&key, aad, plaintext).expect("encryption succeeds");
        let decrypted = decrypt_bytes(&key, aad, &encrypted).expect("decryption succeeds");

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn different_aad_fails() {
        let key = test_key();
        let plaintext = b"secret message";

        let encrypted = encrypt_bytes(&key, b"aad-1", plaintext).expect("encryption succeeds");
        let result = decrypt_bytes(&key, b"aad-2", &encrypted);

        assert!(result.is_err());
    }

    #[test]
    fn modified_ciphertext_fails() {
        let key = test_key();
        let aad = b"test-aad";

        let mut encrypted = encrypt_bytes(&key, aad, b"secret message").expect("encryption succeeds");
        encrypted[13] ^= 0x01;

        let result = decrypt_bytes(&key, aad, &encrypted);
        assert!(result.is_err());
    }

    #[test]
    fn nonce_uniqueness() {
        let key = test_key();
        let aad = b"test-aad";
        let plaintext = b"secret message";

        let encrypted1 = encrypt_bytes(&key, aad, plaintext).expect("encryption succeeds");
        let encrypted2 = encrypt_bytes(&key, aad, plaintext).expect("encryption succeeds");

        assert_ne!(&encrypted1[1..13], &encrypted2[1..13]);
        assert_eq!(
            decrypt_bytes(&key, aad, &encrypted1).expect("decryption succeeds"),
            plaintext
        );
        assert_eq!(
            decrypt_bytes(&key, aad, &encrypted2).expect("decryption succeeds"),
            plaintext
        );
    }

    #[test]
    fn legacy_plaintext_passthrough() {
        let key = test_key();
        let legacy = b"legacy-api-key".to_vec(); // no version marker

        let result = decrypt_bytes(&key, b"aad", &legacy).expect("legacy plaintext is returned");
        assert_eq!(result, legacy);
        assert!(!is_encrypted_payload(&legacy));
    }

    #[test]
    fn tenant_api_key_roundtrip() {
        let key = test_key();
        let tenant_id = Uuid::new_v4();
        let base_url = "https://n8n.example.com";

        let ciphertext = encrypt_tenant_api_key(&key, tenant_id, base_url, "n8n-api-key-123")
            .expect("encryption succeeds");
        assert!(is_encrypted_payload(&ciphertext));

        let recovered = decrypt_tenant_api_key(&key, tenant_id, base_url, &ciphertext)
            .expect("decryption succeeds");
        assert_eq!(recovered, "n8n-api-key-123");
    }

    #[test]
    fn tenant_api_key_bound_to_tenant() {
        let key = test_key();
        let base_url = "https://n8n.example.com";

        let ciphertext = encrypt_tenant_api_key(&key, Uuid::new_v4(), base_url, "n8n-api-key-123")
            .expect("encryption succeeds");

        let result = decrypt_tenant_api_key(&key, Uuid::new_v4(), base_url, &ciphertext);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(CryptoKey::new(vec![0u8; 16]).is_err());
        assert!(CryptoKey::new(vec![0u8; 64]).is_err());
    }

    #[test]
    fn truncated_ciphertext_rejected() {
        let key = test_key();
        let short = vec![VERSION_ENCRYPTED, 0x02];

        let result = decrypt_bytes(&key, b"aad", &short);
        assert!(matches!(result, Err(CryptoError::InvalidFormat)));
    }
}
