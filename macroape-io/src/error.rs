//! Errors raised while reading external data.

use std::sync::Arc;

use nom::error::Error as NomError;

/// An error raised by the parsers of this crate.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// The data was parsed but does not describe a valid object.
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// The underlying reader failed.
    #[error(transparent)]
    Io(Arc<std::io::Error>),
    /// The data could not be parsed.
    #[error("parse error: {0}")]
    Nom(Arc<NomError<String>>),
    /// The parsed values were rejected by the models.
    #[error(transparent)]
    Core(#[from] macroape::err::Error),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(Arc::new(error))
    }
}

impl From<NomError<&'_ str>> for Error {
    fn from(error: NomError<&'_ str>) -> Self {
        Error::Nom(Arc::new(NomError::new(error.input.to_string(), error.code)))
    }
}

impl From<nom::Err<NomError<&'_ str>>> for Error {
    fn from(err: nom::Err<NomError<&'_ str>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Error::InvalidData("incomplete input".into()),
            nom::Err::Error(e) => Error::from(e),
            nom::Err::Failure(e) => Error::from(e),
        }
    }
}
