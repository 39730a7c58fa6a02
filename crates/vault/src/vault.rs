use serde_json::Value;
use std::collections::HashMap;

use crate::cipher;
use crate::error::VaultError;
use crate::key::VaultKey;
use crate::sensitive::{is_sensitive_field, mask_value};

const ENC_PREFIX: &str = "ENC:";

/// At-rest encryption for plugin configuration. Sensitive
/// string fields are AEAD-encrypted and stored with the `ENC:` prefix;
/// everything else is left as plaintext.
pub struct Vault {
    key: VaultKey,
}

impl Vault {
    pub fn new(key: VaultKey) -> Self {
        Self { key }
    }

    /// Encrypt a single plaintext string, returning the `ENC:`-prefixed form.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String, VaultError> {
        let encoded = cipher::encrypt(&self.key, plaintext.as_bytes())?;
        Ok(format!("{ENC_PREFIX}{encoded}"))
    }

    /// Decrypt a value. Idempotent: a value without the `ENC:` prefix is
    /// assumed already plaintext and returned unchanged.
    pub fn decrypt_str(&self, value: &str) -> Result<String, VaultError> {
        match value.strip_prefix(ENC_PREFIX) {
            Some(encoded) => {
                let bytes = cipher::decrypt(&self.key, encoded)?;
                String::from_utf8(bytes).map_err(|e| VaultError::Decrypt(e.to_string()))
            }
            None => Ok(value.to_string()),
        }
    }

    /// Encrypt every sensitive string field of a plugin config in place.
    pub fn encrypt_config(
        &self,
        config: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, VaultError> {
        let mut out = HashMap::with_capacity(config.len());
        for (key, value) in config {
            let encrypted = match value {
                Value::String(s) if is_sensitive_field(key) => {
                    Value::String(self.encrypt_str(s)?)
                }
                other => other.clone(),
            };
            out.insert(key.clone(), encrypted);
        }
        Ok(out)
    }

    /// Decrypt every `ENC:`-prefixed string field of a stored config.
    pub fn decrypt_config(
        &self,
        config: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, VaultError> {
        let mut out = HashMap::with_capacity(config.len());
        for (key, value) in config {
            let decrypted = match value {
                Value::String(s) => Value::String(self.decrypt_str(s)?),
                other => other.clone(),
            };
            out.insert(key.clone(), decrypted);
        }
        Ok(out)
    }

    /// Masked view of a config, the only representation allowed in logs or
    /// audit entries: plaintext non-sensitive fields, masked
    /// sensitive ones.
    pub fn masked_config(&self, config: &HashMap<String, Value>) -> HashMap<String, Value> {
        let mut out = HashMap::with_capacity(config.len());
        for (key, value) in config {
            let masked = match value {
                Value::String(s) if is_sensitive_field(key) => {
                    let plain = self.decrypt_str(s).unwrap_or_else(|_| s.clone());
                    Value::String(mask_value(&plain))
                }
                other => other.clone(),
            };
            out.insert(key.clone(), masked);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vault() -> Vault {
        Vault::new(VaultKey::from_hex(&"77".repeat(32)).unwrap())
    }

    #[test]
    fn encrypt_then_decrypt_config_is_identity() {
        let vault = vault();
        let mut config = HashMap::new();
        config.insert("host".to_string(), json!("db.internal"));
        config.insert("password".to_string(), json!("hunter2"));

        let encrypted = vault.encrypt_config(&config).unwrap();
        assert_eq!(encrypted["host"], json!("db.internal"));
        assert!(encrypted["password"].as_str().unwrap().starts_with("ENC:"));

        let decrypted = vault.decrypt_config(&encrypted).unwrap();
        assert_eq!(decrypted, config);
    }

    #[test]
    fn decrypt_is_idempotent_on_plaintext() {
        let vault = vault();
        assert_eq!(vault.decrypt_str("already-plaintext").unwrap(), "already-plaintext");
    }

    #[test]
    fn masked_config_never_exposes_raw_secret() {
        let vault = vault();
        let mut config = HashMap::new();
        config.insert("apiKey".to_string(), json!("sk-abcdef123456"));
        let encrypted = vault.encrypt_config(&config).unwrap();

        let masked = vault.masked_config(&encrypted);
        let masked_value = masked["apiKey"].as_str().unwrap();
        assert!(!masked_value.contains("abcdef123456"));
        assert!(masked_value.starts_with("sk-"));
    }
}
