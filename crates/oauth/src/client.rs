use std::sync::Arc;

use {
    reqwest::{
        IntoUrl, Method, RequestBuilder, Response,
        header::{AUTHORIZATION, HeaderValue},
    },
    secrecy::{ExposeSecret, Secret},
    skiff_common::{Redactor, SecretKind},
    tokio::sync::RwLock,
    tracing::{debug, warn},
};

use crate::{
    error::{Context, Error, Result},
    flow::OAuthFlow,
    storage::TokenStore,
    types::OAuthTokens,
};

/// HTTP client handle that attaches the current access token to every
/// request and refreshes it when it expires.
pub struct AuthorizedClient {
    flow: Arc<OAuthFlow>,
    store: TokenStore,
    redactor: Redactor,
    tokens: RwLock<OAuthTokens>,
    builder: reqwest::Client,
}

impl AuthorizedClient {
    pub(crate) fn new(
        flow: Arc<OAuthFlow>,
        store: TokenStore,
        redactor: Redactor,
        tokens: OAuthTokens,
    ) -> Self {
        register_tokens(&redactor, &tokens);
        Self {
            flow,
            store,
            redactor,
            tokens: RwLock::new(tokens),
            builder: reqwest::Client::new(),
        }
    }

    /// Snapshot of the tokens currently in use.
    pub async fn tokens(&self) -> OAuthTokens {
        self.tokens.read().await.clone()
    }

    /// A valid access token, refreshed first if the cached one expired.
    pub async fn access_token(&self) -> Result<Secret<String>> {
        {
            let tokens = self.tokens.read().await;
            if !tokens.is_expired() {
                return Ok(tokens.access_token.clone());
            }
        }

        let mut tokens = self.tokens.write().await;
        // Another request may have refreshed while we waited for the lock.
        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }
        let Some(refresh_token) = tokens.refresh_token.clone() else {
            return Err(Error::authorization(
                "access token expired and no refresh token is cached; run `skiff auth login`",
            ));
        };

        let mut fresh = self.flow.refresh(&refresh_token).await?;
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = Some(refresh_token);
        }
        register_tokens(&self.redactor, &fresh);

        if let Err(e) = self.store.save(&self.flow.config().client_id, &fresh) {
            warn!(error = %e, "refreshed token not persisted");
        }
        *tokens = fresh;
        Ok(tokens.access_token.clone())
    }

    /// Start a request. Send it with [`send`](Self::send) so it carries the
    /// token and goes through the configured transport.
    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.builder.request(method, url)
    }

    pub fn get(&self, url: impl IntoUrl) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let token = self.access_token().await?;
        let mut request = builder.build()?;

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .context("access token is not a valid header value")?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);

        debug!(method = %request.method(), url = %request.url(), "authorized request");
        self.flow.transport().execute(request).await
    }
}

pub(crate) fn register_tokens(redactor: &Redactor, tokens: &OAuthTokens) {
    redactor.register(SecretKind::AccessToken, tokens.access_token.expose_secret());
    if let Some(rt) = &tokens.refresh_token {
        redactor.register(SecretKind::RefreshToken, rt.expose_secret());
    }
}
