use std::error::Error as StdError;

use {skiff_common::FromMessage, skiff_vault::VaultError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The downloaded bytes do not match what the remote properties promise.
    #[error("corrupted encrypted file: {reason}")]
    CorruptedFile { reason: String },

    #[error("invalid remote property {name}: {message}")]
    InvalidProperty { name: &'static str, message: String },

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::CorruptedFile {
            reason: reason.into(),
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
