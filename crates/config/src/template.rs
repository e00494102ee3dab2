//! Default configuration template written by `skiff init`.
//!
//! Every option is listed with its default, commented out where leaving it
//! unset is the right choice.

use crate::schema::{CLIENT_ID_PLACEHOLDER, CLIENT_SECRET_PLACEHOLDER, DEFAULT_NUM_WORKERS};

/// The documented `skiff.toml` template.
#[must_use]
pub fn default_config_template() -> String {
    format!(
        r##"# Skiff Configuration
# ===================
# Keep this file private: it may hold your OAuth client secret and the
# wrapped content-encryption key. skiff refuses to read it when group or
# other can access it.

# ══════════════════════════════════════════════════════════════════════════════
# GOOGLE APPLICATION
# ══════════════════════════════════════════════════════════════════════════════
# Leave the placeholders to use the built-in application credentials.

[google]
client_id = "{CLIENT_ID_PLACEHOLDER}"
client_secret = "{CLIENT_SECRET_PLACEHOLDER}"
# api_key = ""                      # Appended as ?key=... to every request
# auth_url = "https://accounts.google.com/o/oauth2/auth"
# token_url = "https://accounts.google.com/o/oauth2/token"
# scopes = ["https://www.googleapis.com/auth/drive"]

# ══════════════════════════════════════════════════════════════════════════════
# ENCRYPTION
# ══════════════════════════════════════════════════════════════════════════════
# Run "skiff genkey" and paste its output here to enable encrypted uploads.
# The passphrase itself is read from $SKIFF_PASSPHRASE at use time.

[encryption]
# salt = ""
# passphrase_hash = ""
# encrypted_key = ""
# encrypted_key_iv = ""

# ══════════════════════════════════════════════════════════════════════════════
# TRANSFERS
# ══════════════════════════════════════════════════════════════════════════════

[upload]
ignored_regexp = []                 # Local file names to skip, e.g. ["\\.o$", "~$"]
bytes_per_second_limit = 0          # 0 = unlimited

[download]
bytes_per_second_limit = 0          # 0 = unlimited

[transfer]
num_workers = {DEFAULT_NUM_WORKERS}                     # Concurrent transfer workers

# ══════════════════════════════════════════════════════════════════════════════
# AUTHORIZATION
# ══════════════════════════════════════════════════════════════════════════════

[auth]
browser_launchers = ["xdg-open", "google-chrome", "open"]
# token_cache = "~/.config/skiff/tokencache.json"
"##
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::validate::validate_toml_str};

    #[test]
    fn template_is_valid_toml_without_diagnostics() {
        let result = validate_toml_str(&default_config_template());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn template_parses_to_defaults() {
        let mut config: crate::SkiffConfig = toml::from_str(&default_config_template()).unwrap();
        config.normalize();
        assert!(config.google.client_id.is_none());
        assert_eq!(config.transfer.num_workers, DEFAULT_NUM_WORKERS);
    }
}
