pub mod broker;
pub mod callback_server;
pub mod client;
pub mod defaults;
pub mod error;
pub mod flow;
pub mod interact;
pub mod pkce;
pub mod storage;
pub mod transport;
pub mod types;

pub use {
    broker::CredentialBroker,
    callback_server::{CALLBACK_PATH, CallbackListener, ListenerState},
    client::AuthorizedClient,
    defaults::{DEFAULT_CLIENT_ID, MANUAL_REDIRECT_URI, load_oauth_config},
    flow::{AuthorizationRequest, OAuthFlow},
    interact::{Interaction, Terminal},
    storage::{CachedToken, TokenStore},
    transport::{ApiKeyTransport, FlakyTransport, LoggingTransport, SharedTransport, Transport},
    types::{OAuthConfig, OAuthTokens, PkceChallenge, serialize_option_secret, serialize_secret},
};

pub use error::{Error, Result};
