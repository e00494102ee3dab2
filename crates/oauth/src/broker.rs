//! Token cache lookup, interactive authorization and code exchange.

use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    skiff_common::{Redactor, SecretKind},
    tracing::{info, warn},
};

use crate::{
    callback_server::CallbackListener,
    client::{AuthorizedClient, register_tokens},
    defaults::MANUAL_REDIRECT_URI,
    error::Result,
    flow::OAuthFlow,
    interact::Interaction,
    pkce::generate_state,
    storage::TokenStore,
    transport::SharedTransport,
    types::{OAuthConfig, OAuthTokens},
};

/// Produces an [`AuthorizedClient`], from the token cache when it can and by
/// asking the user otherwise.
pub struct CredentialBroker {
    flow: Arc<OAuthFlow>,
    store: TokenStore,
    interaction: Arc<dyn Interaction>,
    redactor: Redactor,
}

impl CredentialBroker {
    /// Client id and secret are registered with `redactor` here, before any
    /// request is made.
    pub fn new(
        config: OAuthConfig,
        store: TokenStore,
        transport: SharedTransport,
        interaction: Arc<dyn Interaction>,
        redactor: Redactor,
    ) -> Self {
        redactor.register(SecretKind::ClientId, &config.client_id);
        if let Some(secret) = &config.client_secret {
            redactor.register(SecretKind::ClientSecret, secret.expose_secret());
        }
        Self {
            flow: Arc::new(OAuthFlow::new(config, transport)),
            store,
            interaction,
            redactor,
        }
    }

    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.flow.config().client_id
    }

    /// Client from the cached token if it belongs to this client id,
    /// otherwise from a fresh authorization.
    pub async fn authenticate(&self, allow_browser: bool) -> Result<AuthorizedClient> {
        let tokens = match self.store.load_for(self.client_id()) {
            Some(tokens) => tokens,
            None => self.authorize(allow_browser).await?,
        };
        Ok(self.client(tokens))
    }

    /// Run the interactive authorization and persist the result, ignoring
    /// whatever is cached.
    pub async fn authorize(&self, allow_browser: bool) -> Result<OAuthTokens> {
        let (code, request) = if allow_browser {
            let state = generate_state();
            let listener = CallbackListener::bind(state.clone()).await?;
            let request = self
                .flow
                .start_with_state(&listener.redirect_uri(), state)?;

            // A launch failure drops the listener, which releases the port.
            self.interaction.open_browser(&request.url).await?;
            info!(redirect_uri = %request.redirect_uri, "waiting for the authorization callback");
            (listener.wait_for_code().await?, request)
        } else {
            let request = self.flow.start(MANUAL_REDIRECT_URI)?;
            (self.interaction.prompt_for_code(&request.url).await?, request)
        };

        let tokens = self.flow.exchange(&code, &request).await?;
        register_tokens(&self.redactor, &tokens);

        if let Err(e) = self.store.save(self.client_id(), &tokens) {
            warn!(error = %e, "continuing without a token cache");
        }
        Ok(tokens)
    }

    fn client(&self, tokens: OAuthTokens) -> AuthorizedClient {
        AuthorizedClient::new(
            Arc::clone(&self.flow),
            self.store.clone(),
            self.redactor.clone(),
            tokens,
        )
    }
}
