use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use {
    secrecy::ExposeSecret,
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    types::OAuthTokens,
};

/// Token cache entry on disk: the tokens plus the client id they were issued
/// to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub client_id: String,
    #[serde(flatten)]
    pub tokens: OAuthTokens,
}

/// Single-token JSON cache, e.g. `~/.config/skiff/tokencache.json`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cache. `Ok(None)` when the file does not exist.
    pub fn read(&self) -> Result<Option<CachedToken>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.unreadable(e)),
        };
        let cached: CachedToken = serde_json::from_str(&data).map_err(|e| self.unreadable(e))?;
        if cached.tokens.access_token.expose_secret().is_empty() {
            return Err(self.unreadable("empty access_token"));
        }
        Ok(Some(cached))
    }

    /// Tokens usable by `client_id`, or `None` when the caller has to
    /// authorize again.
    pub fn load_for(&self, client_id: &str) -> Option<OAuthTokens> {
        let path = self.path.display().to_string();
        match self.read() {
            Ok(Some(cached)) if cached.client_id == client_id => {
                debug!(path = %path, "cached token loaded");
                Some(cached.tokens)
            },
            Ok(Some(_)) => {
                info!(path = %path, "cached token belongs to another client id; ignoring it");
                None
            },
            Ok(None) => {
                debug!(path = %path, "no cached token");
                None
            },
            Err(e) => {
                warn!(error = %e, "ignoring token cache");
                None
            },
        }
    }

    /// Replace the cache with `tokens`, bound to `client_id`.
    ///
    /// The new content is written to a temporary file next to the cache and
    /// renamed over it, so a crash leaves either the old or the new file.
    pub fn save(&self, client_id: &str, tokens: &OAuthTokens) -> Result<()> {
        let cached = CachedToken {
            client_id: client_id.to_string(),
            tokens: tokens.clone(),
        };
        let data = serde_json::to_vec_pretty(&cached)?;
        self.write_atomic(&data)
            .map_err(|source| Error::TokenCacheWriteFailed {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path.display(), "token cache saved");
        Ok(())
    }

    /// Remove the cache. Returns whether a file was there.
    pub fn delete(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "token cache deleted");
                Ok(true)
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, data: &[u8]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn unreadable(&self, reason: impl std::fmt::Display) -> Error {
        Error::TokenCacheUnreadable {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    fn tokens(access: &str) -> OAuthTokens {
        OAuthTokens {
            access_token: Secret::new(access.into()),
            refresh_token: Some(Secret::new("1//refresh".into())),
            expires_at: Some(1_900_000_000),
            token_type: Some("Bearer".into()),
        }
    }

    fn store(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("tokencache.json"))
    }

    #[test]
    fn save_then_load_same_client() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save("client-a", &tokens("ya29.a")).unwrap();

        let loaded = store.load_for("client-a").unwrap();
        assert_eq!(loaded.access_token.expose_secret(), "ya29.a");
        assert_eq!(
            loaded.refresh_token.unwrap().expose_secret(),
            "1//refresh"
        );
        assert_eq!(loaded.expires_at, Some(1_900_000_000));
        assert_eq!(loaded.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn other_client_id_is_not_usable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save("client-a", &tokens("ya29.a")).unwrap();
        assert!(store.load_for("client-b").is_none());
        // The file itself is still readable.
        assert_eq!(store.read().unwrap().unwrap().client_id, "client-a");
    }

    #[test]
    fn on_disk_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save("cid", &tokens("at")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        let obj = raw.as_object().unwrap();
        for key in ["client_id", "access_token", "refresh_token", "expiry", "token_type"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn malformed_cache_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(
            store.read(),
            Err(Error::TokenCacheUnreadable { .. })
        ));
        assert!(store.load_for("cid").is_none());
    }

    #[test]
    fn empty_access_token_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(
            store.path(),
            r#"{"client_id":"cid","access_token":"","expiry":1}"#,
        )
        .unwrap();
        assert!(matches!(
            store.read(),
            Err(Error::TokenCacheUnreadable { .. })
        ));
    }

    #[test]
    fn missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(&dir).read().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn cache_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save("cid", &tokens("at")).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn save_replaces_previous_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save("cid", &tokens("first")).unwrap();
        store.save("cid", &tokens("second")).unwrap();
        assert_eq!(
            store.load_for("cid").unwrap().access_token.expose_secret(),
            "second"
        );
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn unwritable_location_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let store = TokenStore::new(blocker.join("tokencache.json"));
        assert!(matches!(
            store.save("cid", &tokens("at")),
            Err(Error::TokenCacheWriteFailed { .. })
        ));
    }

    #[test]
    fn delete_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(!store.delete().unwrap());
        store.save("cid", &tokens("at")).unwrap();
        assert!(store.delete().unwrap());
        assert!(store.read().unwrap().is_none());
    }
}
