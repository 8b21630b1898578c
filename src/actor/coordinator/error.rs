use thiserror::Error;

/// Why a build failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Nothing good was ever built; the server must not serve.
    #[error("startup failed: {0}")]
    StartupFatal(String),
    /// Live rebuild failed; the previous output keeps being served.
    #[error("rebuild failed: {0}")]
    Recoverable(String),
}

impl BuildError {
    pub fn message(&self) -> &str {
        match self {
            Self::StartupFatal(message) | Self::Recoverable(message) => message,
        }
    }

    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::StartupFatal(_))
    }

    /// The same failure, seen before any good output exists.
    pub fn into_fatal(self) -> Self {
        match self {
            Self::Recoverable(message) => Self::StartupFatal(message),
            fatal => fatal,
        }
    }
}
