//! Vault error types.

use skiff_common::FromMessage;

/// Errors produced by key derivation, key unwrapping and the stream cipher.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VaultError {
    /// No passphrase source yielded a value.
    #[error("no passphrase available; set {source_name} to use encryption")]
    MissingPassphrase { source_name: String },

    /// The passphrase does not match the stored verifier.
    #[error("incorrect passphrase (does not match [encryption] passphrase_hash)")]
    InvalidPassphrase,

    /// A key or IV of the wrong length reached the cipher.
    #[error("invalid {what}: expected {expected} bytes, got {actual}")]
    InvalidKeyMaterial {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A key-setup field in the config is missing, not hex, or the wrong length.
    #[error("missing or invalid [encryption] {field} value (expecting {expected_hex} hex characters)")]
    MalformedConfig {
        field: &'static str,
        expected_hex: usize,
    },

    /// Encryption was requested but the config carries no key setup.
    #[error("encryption is not configured; run \"skiff genkey\" and add its output to [encryption]")]
    NotConfigured,

    #[error("{message}")]
    Message { message: String },
}

impl VaultError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl FromMessage for VaultError {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Error = VaultError;
pub type Result<T> = std::result::Result<T, Error>;

skiff_common::impl_context!();
