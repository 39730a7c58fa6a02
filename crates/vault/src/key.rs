use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::error::VaultError;

/// Process-wide 256-bit AEAD key. Loaded once at bootstrap.
#[derive(Clone)]
pub struct VaultKey(pub(crate) [u8; 32]);

impl VaultKey {
    /// Direct hex-encoded 32-byte key, e.g. `PLUGIN_ENCRYPTION_KEY`.
    pub fn from_hex(hex_key: &str) -> Result<Self, VaultError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| VaultError::KeyInit(format!("not valid hex: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| VaultError::KeyInit("key must be exactly 32 bytes".to_string()))?;
        Ok(Self(arr))
    }

    /// Derive a key from an operator-supplied passphrase with a salted KDF
    /// (HKDF-SHA256), "derived from a passphrase with a
    /// salted KDF".
    pub fn from_passphrase(passphrase: &str, salt: &[u8]) -> Result<Self, VaultError> {
        let hk = Hkdf::<Sha256>::new(Some(salt), passphrase.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(b"warden-vault-key", &mut key)
            .map_err(|e| VaultError::KeyInit(format!("HKDF expand failed: {e}")))?;
        Ok(Self(key))
    }

    /// Development-only fallback derived from the hostname. This path must
    /// never be taken in production builds — callers (wardend) enforce that
    /// by refusing this constructor when `run_mode=production`.
    pub fn dev_fallback(hostname: &str) -> Self {
        tracing::warn!(
            hostname,
            "no PLUGIN_ENCRYPTION_KEY or passphrase configured; deriving a development-only \
             vault key from the hostname. This is insecure and must not be used in production."
        );
        let digest = Sha256::digest(format!("warden-dev-key:{hostname}").as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self(key)
    }

    pub fn bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_hex_roundtrips() {
        let hex_key = "0".repeat(64);
        let key = VaultKey::from_hex(&hex_key).unwrap();
        assert_eq!(key.bytes(), &[0u8; 32]);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(VaultKey::from_hex("abcd").is_err());
    }

    #[test]
    fn dev_fallback_is_deterministic_per_hostname() {
        let a = VaultKey::dev_fallback("host-a");
        let b = VaultKey::dev_fallback("host-a");
        let c = VaultKey::dev_fallback("host-b");
        assert_eq!(a.bytes(), b.bytes());
        assert_ne!(a.bytes(), c.bytes());
    }
}
