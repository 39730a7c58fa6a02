use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::error::VaultError;
use crate::key::VaultKey;

const TAG_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// AES-256-GCM encrypt, serialised as `<iv-hex>:<auth-tag-hex>:<ciphertext-hex>`
/// per "Encrypted value format".
pub fn encrypt(key: &VaultKey, plaintext: &[u8]) -> Result<String, VaultError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.bytes()));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::Encrypt(e.to_string()))?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
        "{}:{}:{}",
        hex::encode(nonce_bytes),
        hex::encode(tag),
        hex::encode(sealed)
    ))
}

/// Inverse of [`encrypt`].
pub fn decrypt(key: &VaultKey, encoded: &str) -> Result<Vec<u8>, VaultError> {
    let mut parts = encoded.splitn(3, ':');
    let (iv_hex, tag_hex, ciphertext_hex) = match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c)) => (a, b, c),
        _ => return Err(VaultError::MalformedEnvelope),
    };

    let nonce_bytes = hex::decode(iv_hex).map_err(|_| VaultError::MalformedEnvelope)?;
    let tag = hex::decode(tag_hex).map_err(|_| VaultError::MalformedEnvelope)?;
    let ciphertext = hex::decode(ciphertext_hex).map_err(|_| VaultError::MalformedEnvelope)?;
    if nonce_bytes.len() != NONCE_LEN || tag.len() != TAG_LEN {
        return Err(VaultError::MalformedEnvelope);
    }

    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.bytes()));
    let nonce = Nonce::from_slice(&nonce_bytes);
    cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|e| VaultError::Decrypt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_is_identity() {
        let key = VaultKey::from_hex(&"11".repeat(32)).unwrap();
        let plaintext = b"s3cr3t-password";
        let encoded = encrypt(&key, plaintext).unwrap();
        assert_eq!(encoded.split(':').count(), 3);
        let decrypted = decrypt(&key, &encoded).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn nonces_are_unique_per_call() {
        let key = VaultKey::from_hex(&"22".repeat(32)).unwrap();
        let a = encrypt(&key, b"same").unwrap();
        let b = encrypt(&key, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = VaultKey::from_hex(&"33".repeat(32)).unwrap();
        let encoded = encrypt(&key, b"payload").unwrap();
        let mut parts: Vec<&str> = encoded.split(':').collect();
        let mut tampered_ct = hex::decode(parts[2]).unwrap();
        tampered_ct[0] ^= 0xff;
        let tampered_hex = hex::encode(tampered_ct);
        parts[2] = &tampered_hex;
        let tampered = parts.join(":");
        assert!(decrypt(&key, &tampered).is_err());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key_a = VaultKey::from_hex(&"44".repeat(32)).unwrap();
        let key_b = VaultKey::from_hex(&"55".repeat(32)).unwrap();
        let encoded = encrypt(&key_a, b"payload").unwrap();
        assert!(decrypt(&key_b, &encoded).is_err());
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let key = VaultKey::from_hex(&"66".repeat(32)).unwrap();
        assert!(decrypt(&key, "not-a-valid-envelope").is_err());
    }
}
