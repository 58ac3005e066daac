use std::error::Error as StdError;

use thiserror::Error;

/// Errors from the Telegram transport.
#[derive(Debug, Error)]
pub enum Error {
    /// A Bot API call failed.
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Channel(#[from] chatmux_channels::Error),

    /// `getFile` answered without a path, so no download link can be built.
    #[error("file {file_id} has no download path")]
    MissingFilePath { file_id: String },

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
    pub fn external(context: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
