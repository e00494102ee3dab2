//! Config schema types for `skiff.toml`.

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

/// Placeholder written by `skiff init`; treated as unset.
pub const CLIENT_ID_PLACEHOLDER: &str = "YOUR_GOOGLE_APP_CLIENT_ID";
/// Placeholder written by `skiff init`; treated as unset.
pub const CLIENT_SECRET_PLACEHOLDER: &str = "YOUR_GOOGLE_APP_SECRET";

/// Default number of concurrent transfer workers.
pub const DEFAULT_NUM_WORKERS: usize = 4;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkiffConfig {
    pub google: GoogleConfig,
    pub encryption: EncryptionConfig,
    pub upload: UploadConfig,
    pub download: DownloadConfig,
    pub transfer: TransferConfig,
    pub auth: AuthConfig,
}

impl SkiffConfig {
    /// Drop the template placeholders so they behave like unset values.
    pub fn normalize(&mut self) {
        self.google.normalize();
        self.encryption.normalize();
    }
}

/// OAuth client overrides and the optional API key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Overrides the built-in application client id.
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    /// Appended to every request as `?key=...` when set.
    pub api_key: Option<Secret<String>>,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl GoogleConfig {
    fn normalize(&mut self) {
        if self
            .client_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty() || id == CLIENT_ID_PLACEHOLDER)
        {
            self.client_id = None;
        }
        if self.client_secret.as_ref().is_some_and(|s| {
            let s = s.expose_secret();
            s.trim().is_empty() || s == CLIENT_SECRET_PLACEHOLDER
        }) {
            self.client_secret = None;
        }
        if self
            .api_key
            .as_ref()
            .is_some_and(|k| k.expose_secret().trim().is_empty())
        {
            self.api_key = None;
        }
    }
}

/// Key-setup material produced by `skiff genkey`, all hex encoded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub salt: Option<String>,
    pub passphrase_hash: Option<String>,
    pub encrypted_key: Option<String>,
    pub encrypted_key_iv: Option<String>,
}

/// One of the four key-setup fields, with its required decoded length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionField {
    Salt,
    PassphraseHash,
    EncryptedKey,
    EncryptedKeyIv,
}

impl EncryptionField {
    pub const ALL: [Self; 4] = [
        Self::Salt,
        Self::PassphraseHash,
        Self::EncryptedKey,
        Self::EncryptedKeyIv,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Salt => "salt",
            Self::PassphraseHash => "passphrase_hash",
            Self::EncryptedKey => "encrypted_key",
            Self::EncryptedKeyIv => "encrypted_key_iv",
        }
    }

    /// Decoded length in bytes.
    #[must_use]
    pub fn byte_len(self) -> usize {
        match self {
            Self::EncryptedKeyIv => 16,
            Self::Salt | Self::PassphraseHash | Self::EncryptedKey => 32,
        }
    }
}

impl EncryptionConfig {
    #[must_use]
    pub fn get(&self, field: EncryptionField) -> Option<&str> {
        match field {
            EncryptionField::Salt => self.salt.as_deref(),
            EncryptionField::PassphraseHash => self.passphrase_hash.as_deref(),
            EncryptionField::EncryptedKey => self.encrypted_key.as_deref(),
            EncryptionField::EncryptedKeyIv => self.encrypted_key_iv.as_deref(),
        }
    }

    /// True when any key-setup field is present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        EncryptionField::ALL.iter().any(|f| self.get(*f).is_some())
    }

    /// True when every key-setup field is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        EncryptionField::ALL.iter().all(|f| self.get(*f).is_some())
    }

    fn normalize(&mut self) {
        for slot in [
            &mut self.salt,
            &mut self.passphrase_hash,
            &mut self.encrypted_key,
            &mut self.encrypted_key_iv,
        ] {
            if slot.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *slot = None;
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Local file names matching any of these are skipped by uploads.
    pub ignored_regexp: Vec<String>,
    /// 0 means unlimited.
    pub bytes_per_second_limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// 0 means unlimited.
    pub bytes_per_second_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub num_workers: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
        }
    }
}

/// Interactive authorization settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Programs tried in order to open the authorization URL.
    pub browser_launchers: Vec<String>,
    /// Token cache location; defaults to `~/.config/skiff/tokencache.json`.
    pub token_cache: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            browser_launchers: default_browser_launchers(),
            token_cache: None,
        }
    }
}

fn default_browser_launchers() -> Vec<String> {
    ["xdg-open", "google-chrome", "open"]
        .into_iter()
        .map(String::from)
        .collect()
}
