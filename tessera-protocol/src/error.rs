use std::result;
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Protocol-level error type. The metadata engine wraps these in its own
/// refresh error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    /// A token string could not be parsed for the ring's partitioner.
    #[error("Error parsing token: {0}")]
    TokenParse(String),
    /// General error.
    #[error("General error: {0}")]
    General(String),
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::General(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Error {
        Error::General(err.to_string())
    }
}
