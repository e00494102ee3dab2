use {secrecy::Secret, skiff_config::GoogleConfig};

use crate::types::OAuthConfig;

/// Built-in installed-application client id.
pub const DEFAULT_CLIENT_ID: &str =
    "952282617835-siotrfjbktpinek08hrnspl33d9gho1e.apps.googleusercontent.com";
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Redirect URI for copy-and-paste authorization without a local listener.
pub const MANUAL_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

const ENV_PREFIX: &str = "SKIFF_OAUTH_";

fn builtin_default() -> OAuthConfig {
    OAuthConfig {
        client_id: DEFAULT_CLIENT_ID.into(),
        client_secret: None,
        auth_url: GOOGLE_AUTH_URL.into(),
        token_url: GOOGLE_TOKEN_URL.into(),
        scopes: vec![DRIVE_SCOPE.into()],
        // Ask for a refresh token every time the user authorizes.
        extra_auth_params: vec![("access_type".into(), "offline".into())],
    }
}

/// Build the OAuth client configuration.
///
/// Priority:
/// 1. Environment variables (`SKIFF_OAUTH_CLIENT_ID`, `..._CLIENT_SECRET`,
///    `..._AUTH_URL`, `..._TOKEN_URL`)
/// 2. The `[google]` section of `skiff.toml`
/// 3. Built-in defaults
pub fn load_oauth_config(google: &GoogleConfig) -> OAuthConfig {
    let mut config = builtin_default();
    apply_file_overrides(&mut config, google);
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

fn apply_file_overrides(config: &mut OAuthConfig, google: &GoogleConfig) {
    // The secret belongs to a custom client id; never pair it with the
    // built-in one.
    if let Some(client_id) = &google.client_id {
        config.client_id = client_id.clone();
        config.client_secret = google.client_secret.clone();
    }
    if let Some(v) = &google.auth_url {
        config.auth_url = v.clone();
    }
    if let Some(v) = &google.token_url {
        config.token_url = v.clone();
    }
    if !google.scopes.is_empty() {
        config.scopes = google.scopes.clone();
    }
}

fn apply_env_overrides(config: &mut OAuthConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}")).filter(|v| !v.is_empty());

    if let Some(v) = var("CLIENT_ID") {
        config.client_id = v;
        config.client_secret = None;
    }
    if let Some(v) = var("CLIENT_SECRET") {
        config.client_secret = Some(Secret::new(v));
    }
    if let Some(v) = var("AUTH_URL") {
        config.auth_url = v;
    }
    if let Some(v) = var("TOKEN_URL") {
        config.token_url = v;
    }
}
