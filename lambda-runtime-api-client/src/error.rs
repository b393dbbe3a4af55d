use std::fmt;

/// A type-erased error that can hold any error implementing `std::error::Error`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Opaque error returned by the transport client and its body types.
///
/// This wraps a [`BoxError`] so that callers one layer up (the runtime orchestration
/// crate) can attach their own stable, matchable error kinds instead of matching on
/// this crate's internals.
#[derive(Debug)]
pub struct Error(BoxError);

impl Error {
    /// Wrap any standard error in an `Error`.
    pub fn new<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self(err.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<Error> for BoxError {
    fn from(err: Error) -> Self {
        err.0
    }
}
