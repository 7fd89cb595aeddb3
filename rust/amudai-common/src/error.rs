use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    /// Returns the kind of the underlying failure, looking through any number
    /// of [`ErrorKind::Shared`] wrappers.
    pub fn root_kind(&self) -> &ErrorKind {
        match self.kind() {
            ErrorKind::Shared(inner) => inner.root_kind(),
            kind => kind,
        }
    }

    /// Whether this error reports text that could not be decoded as a number,
    /// either directly or through a shared failure.
    pub fn is_number_format(&self) -> bool {
        matches!(self.root_kind(), ErrorKind::NumberFormat { .. })
    }

    pub fn invalid_format(name: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: name.into(),
                message: Default::default(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn number_format(text: impl Into<String>, target: &'static str) -> Error {
        Error(
            ErrorKind::NumberFormat {
                text: text.into(),
                target,
            }
            .into(),
        )
    }

    /// Wraps a failure that is reported to more than one caller.
    pub fn shared(source: Arc<Error>) -> Error {
        Error(ErrorKind::Shared(source).into())
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("invalid data format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("cannot decode {text:?} as {target}")]
    NumberFormat { text: String, target: &'static str },

    #[error(transparent)]
    Shared(Arc<Error>),
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
