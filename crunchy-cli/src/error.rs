/// Errors with a meaning of their own for the root dispatcher.
///
/// Everything else travels as a plain [`anyhow::Error`].
#[derive(Debug)]
pub enum Error {
    /// The operation was deliberately aborted, e.g. by Ctrl+C.
    Cancelled,
    /// Global options could not be turned into a working setup.
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "operation was cancelled"),
            Self::Config(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Create a new configuration error.
    pub fn config<T: Into<String>>(reason: T) -> Self {
        Self::Config(reason.into())
    }

    /// Returns true if the error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the error is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Looks through the whole chain, so a cancellation wrapped in context still counts.
pub fn is_cancellation(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|x| x.downcast_ref::<Error>().is_some_and(Error::is_cancelled))
}
