use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption key missing or invalid: {0}")]
    KeyInit(String),
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: {0}")]
    Decrypt(String),
    #[error("malformed encrypted envelope")]
    MalformedEnvelope,
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),
}
