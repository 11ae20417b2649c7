use std::fmt::{self, Display, Formatter};
use std::io;

use hyper::StatusCode;
use thiserror::Error;

use crate::model::CategoryState;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] sqlx::Error),
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Core(#[from] tournament_fixture_core::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid value in column {0}")]
    InvalidColumn(&'static str),
    #[error("not found")]
    NotFound,
    #[error("bad request")]
    BadRequest,
    #[error("{0}")]
    StatusCodeError(#[from] StatusCodeError),
}

/// A rejected operation. Nothing was written when one of these is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("not enough confirmed pairs: at least {min} are required, found {found}")]
    NotEnoughPairs { min: usize, found: usize },
    #[error("the tournament has no courts")]
    NoCourts,
    #[error("the courts of the tournament have no availability windows")]
    NoWindows,
    #[error("the category is {0}")]
    InvalidCategoryState(CategoryState),
    #[error("{0}")]
    Result(tournament_fixture_core::Error),
    #[error("cannot schedule matches: {0}")]
    Schedule(tournament_fixture_core::Error),
}

impl ValidationError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCategoryState(_) => StatusCode::CONFLICT,
            Self::Result(tournament_fixture_core::Error::NotPlayable { .. }) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// An error with an explicit status code and message returned to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusCodeError {
    pub code: StatusCode,
    pub message: String,
}

impl StatusCodeError {
    pub fn new<T>(code: StatusCode, message: T) -> Self
    where
        T: ToString,
    {
        Self {
            code,
            message: message.to_string(),
        }
    }

    /// Replaces the message.
    pub fn message<T>(mut self, message: T) -> Self
    where
        T: ToString,
    {
        self.message = message.to_string();
        self
    }

    fn canonical(code: StatusCode) -> Self {
        Self::new(code, code.canonical_reason().unwrap_or_default())
    }

    pub fn bad_request() -> Self {
        Self::canonical(StatusCode::BAD_REQUEST)
    }

    pub fn not_found() -> Self {
        Self::canonical(StatusCode::NOT_FOUND)
    }

    pub fn method_not_allowed() -> Self {
        Self::canonical(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn request_timeout() -> Self {
        Self::canonical(StatusCode::REQUEST_TIMEOUT)
    }

    pub fn length_required() -> Self {
        Self::canonical(StatusCode::LENGTH_REQUIRED)
    }

    pub fn payload_too_large() -> Self {
        Self::canonical(StatusCode::PAYLOAD_TOO_LARGE)
    }
}

impl Display for StatusCodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_u16(), self.message)
    }
}

impl std::error::Error for StatusCodeError {}

impl From<ValidationError> for StatusCodeError {
    fn from(err: ValidationError) -> Self {
        Self::new(err.status(), err)
    }
}
