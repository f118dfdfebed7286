//! Error type shared by the model constructors.

/// Errors raised while configuring or building a model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration names an unsupported backbone, layer or size.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input data could not be turned into a tensor batch.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Error raised by a tensor operation. Shape and device errors land here.
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    /// The pretrained weights provider failed.
    #[error(transparent)]
    Weights(#[from] anyhow::Error),
}

/// Convenience alias for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true for [`Error::InvalidConfiguration`].
    #[must_use]
    pub const fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}
