use std::error::Error as StdError;

/// Crate-wide result type for message and reply operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors for replies, downloads, and principal parsing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The reply stream was closed: the handler already returned or the
    /// forwarder is gone.
    #[error("reply channel closed")]
    ReplyChannelClosed,

    /// `download` was called on a message that carries no file.
    #[error("nothing to download")]
    NothingToDownload,

    /// Input payload or parameter is invalid.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Wrapped source error from an external dependency.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
