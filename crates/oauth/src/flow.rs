use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, info},
    url::Url,
};

use crate::{
    Error, Result,
    pkce::{generate_pkce, generate_state},
    transport::SharedTransport,
    types::{OAuthConfig, OAuthTokens, PkceChallenge, now_secs},
};

/// Manages the OAuth 2.0 authorization code flow with PKCE.
pub struct OAuthFlow {
    config: OAuthConfig,
    transport: SharedTransport,
    /// Only used to build requests; sending goes through `transport`.
    builder: reqwest::Client,
}

/// One authorization attempt.
pub struct AuthorizationRequest {
    pub url: String,
    pub redirect_uri: String,
    pub pkce: PkceChallenge,
    pub state: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig, transport: SharedTransport) -> Self {
        Self {
            config,
            transport,
            builder: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// Build the authorization URL with a fresh state nonce.
    pub fn start(&self, redirect_uri: &str) -> Result<AuthorizationRequest> {
        self.start_with_state(redirect_uri, generate_state())
    }

    /// Build the authorization URL for a state nonce the caller already
    /// handed to a callback listener.
    pub fn start_with_state(
        &self,
        redirect_uri: &str,
        state: String,
    ) -> Result<AuthorizationRequest> {
        let pkce = generate_pkce();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|source| Error::external("invalid auth_url", source))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &state);

        if !self.config.scopes.is_empty() {
            url.query_pairs_mut()
                .append_pair("scope", &self.config.scopes.join(" "));
        }

        for (key, value) in &self.config.extra_auth_params {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(AuthorizationRequest {
            url: url.to_string(),
            redirect_uri: redirect_uri.to_string(),
            pkce,
            state,
        })
    }

    /// Exchange an authorization code for tokens. No retry on failure.
    pub async fn exchange(
        &self,
        code: &str,
        request: &AuthorizationRequest,
    ) -> Result<OAuthTokens> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.trim().to_string()),
            ("redirect_uri", request.redirect_uri.clone()),
            ("client_id", self.config.client_id.clone()),
            ("code_verifier", request.pkce.verifier.clone()),
        ];
        self.push_secret(&mut form);

        let tokens = self.token_request(&form).await?;
        info!("authorization code exchanged for tokens");
        Ok(tokens)
    }

    /// Refresh an access token using a refresh token.
    pub async fn refresh(&self, refresh_token: &Secret<String>) -> Result<OAuthTokens> {
        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.expose_secret().clone()),
            ("client_id", self.config.client_id.clone()),
        ];
        self.push_secret(&mut form);

        let tokens = self.token_request(&form).await?;
        debug!("access token refreshed");
        Ok(tokens)
    }

    fn push_secret(&self, form: &mut Vec<(&'static str, String)>) {
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.expose_secret().clone()));
        }
    }

    async fn token_request(&self, form: &[(&'static str, String)]) -> Result<OAuthTokens> {
        let request = self
            .builder
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .build()?;

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| Error::authorization(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::authorization(format!("reading token response: {e}")))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {desc}", err.error),
                    None => err.error,
                },
                Err(_) => format!("HTTP {status}"),
            };
            return Err(Error::authorization(format!(
                "token endpoint returned {status}: {detail}"
            )));
        }

        parse_token_response(&body)
    }
}

fn parse_token_response(body: &str) -> Result<OAuthTokens> {
    let resp: TokenResponse = serde_json::from_str(body)
        .map_err(|e| Error::authorization(format!("malformed token response: {e}")))?;
    if resp.access_token.is_empty() {
        return Err(Error::authorization("token response has an empty access_token"));
    }

    Ok(OAuthTokens {
        access_token: Secret::new(resp.access_token),
        refresh_token: resp.refresh_token.map(Secret::new),
        expires_at: resp.expires_in.map(|secs| now_secs() + secs),
        token_type: resp.token_type,
    })
}
