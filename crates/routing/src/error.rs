#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A route pattern could not be compiled.
    #[error("invalid route pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("route '{path}' is already registered")]
    DuplicateRoute { path: String },

    #[error(transparent)]
    Session(#[from] chatmux_sessions::Error),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
