//! Credential vault: AEAD encryption at rest for sensitive plugin config
//! fields, plus a connection-string parser/builder.

mod cipher;
mod connection_string;
mod error;
mod key;
mod sensitive;
#[allow(clippy::module_inception)]
mod vault;

pub use connection_string::{build as build_connection_string, parse as parse_connection_string, ConnectionString};
pub use error::VaultError;
pub use key::VaultKey;
pub use sensitive::{is_sensitive_field, mask_value};
pub use vault::Vault;
