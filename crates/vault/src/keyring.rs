//! Process-wide key ring: unwraps the content key on first use and hands the
//! same key to every transfer worker afterwards.

use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    skiff_config::EncryptionConfig,
    tokio::sync::OnceCell,
    tracing::{debug, info},
};

use crate::{
    envelope::{ContentKey, KeySetup},
    error::{Context, Result, VaultError},
    passphrase::PassphraseSource,
};

/// Key ring status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRingStatus {
    /// The config carries no `[encryption]` key setup.
    NotConfigured,
    /// Key setup present, content key not derived yet.
    Locked,
    /// Content key is held in memory.
    Unlocked,
    /// Unlocking failed; the error is final for this process.
    Failed,
}

/// Holds the key setup, the passphrase source and, once derived, the content
/// key. Construct once at startup and share by reference or `Arc`.
pub struct KeyRing {
    setup: Option<KeySetup>,
    passphrase: Arc<dyn PassphraseSource>,
    /// Outcome of the one derivation, success or failure.
    key: OnceCell<Result<ContentKey>>,
}

impl KeyRing {
    pub fn new(setup: Option<KeySetup>, passphrase: Arc<dyn PassphraseSource>) -> Self {
        Self {
            setup,
            passphrase,
            key: OnceCell::new(),
        }
    }

    /// Build from the `[encryption]` section. A section with no fields yields
    /// a ring without key setup; a partial or malformed one is an error.
    pub fn from_config(
        config: &EncryptionConfig,
        passphrase: Arc<dyn PassphraseSource>,
    ) -> Result<Self> {
        let setup = if config.is_configured() {
            Some(KeySetup::from_config(config)?)
        } else {
            None
        };
        Ok(Self::new(setup, passphrase))
    }

    #[must_use]
    pub fn status(&self) -> KeyRingStatus {
        if self.setup.is_none() {
            KeyRingStatus::NotConfigured
        } else {
            match self.key.get() {
                None => KeyRingStatus::Locked,
                Some(Ok(_)) => KeyRingStatus::Unlocked,
                Some(Err(_)) => KeyRingStatus::Failed,
            }
        }
    }

    /// The content key, deriving it on first call.
    ///
    /// Concurrent first callers wait on a single derivation. Its outcome is
    /// kept: after a failure (for instance
    /// [`VaultError::InvalidPassphrase`]) every caller gets the same error
    /// and the passphrase is never asked for again.
    pub async fn content_key(&self) -> Result<&ContentKey> {
        match self.key.get_or_init(|| self.derive()).await {
            Ok(key) => Ok(key),
            Err(e) => Err(e.clone()),
        }
    }

    async fn derive(&self) -> Result<ContentKey> {
        let setup = self.setup.clone().ok_or(VaultError::NotConfigured)?;
        let passphrase = self.passphrase.passphrase()?;

        debug!("deriving key-encrypting key");
        // PBKDF2 is CPU bound; keep it off the async workers.
        let key = tokio::task::spawn_blocking(move || setup.unwrap_key(passphrase.expose_secret()))
            .await
            .context("key derivation task failed")??;

        info!("content key unlocked");
        Ok(key)
    }
}
