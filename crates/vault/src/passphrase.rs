//! Where the passphrase comes from.

use secrecy::{ExposeSecret, Secret};

use crate::error::{Result, VaultError};

/// Environment variable holding the encryption passphrase.
pub const PASSPHRASE_ENV: &str = "SKIFF_PASSPHRASE";

/// A source the key ring asks for the passphrase on first use.
pub trait PassphraseSource: Send + Sync {
    fn passphrase(&self) -> Result<Secret<String>>;
}

/// Reads the passphrase from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvPassphrase {
    var: String,
}

impl EnvPassphrase {
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvPassphrase {
    fn default() -> Self {
        Self::new(PASSPHRASE_ENV)
    }
}

impl PassphraseSource for EnvPassphrase {
    fn passphrase(&self) -> Result<Secret<String>> {
        match std::env::var(&self.var) {
            Ok(value) if !value.is_empty() => Ok(Secret::new(value)),
            _ => Err(VaultError::MissingPassphrase {
                source_name: format!("the {} environment variable", self.var),
            }),
        }
    }
}

/// A fixed passphrase, e.g. one already read from a prompt.
pub struct StaticPassphrase(Secret<String>);

impl StaticPassphrase {
    #[must_use]
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(Secret::new(passphrase.into()))
    }
}

impl PassphraseSource for StaticPassphrase {
    fn passphrase(&self) -> Result<Secret<String>> {
        let value = self.0.expose_secret();
        if value.is_empty() {
            return Err(VaultError::MissingPassphrase {
                source_name: "a non-empty passphrase".into(),
            });
        }
        Ok(Secret::new(value.clone()))
    }
}
