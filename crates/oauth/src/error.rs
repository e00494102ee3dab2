use std::{error::Error as StdError, path::PathBuf};

use skiff_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The user or the provider refused, or the code exchange failed.
    #[error("authorization failed: {message}")]
    AuthorizationFailed { message: String },

    /// The token cache exists but cannot be used; callers reauthorize.
    #[error("{path}: token cache unreadable: {reason}")]
    TokenCacheUnreadable { path: PathBuf, reason: String },

    /// The token cache could not be written; callers warn and carry on.
    #[error("{path}: token cache write failed: {source}")]
    TokenCacheWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
    #[error("{message}")]
    Message { message: String },
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::AuthorizationFailed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

skiff_common::impl_context!();
