use crate::ParserError;
use num_enum::{TryFromPrimitive, TryFromPrimitiveError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserBmpError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    ParseError(#[from] ParserError),
    #[error("corrupted BMP message")]
    CorruptedBmpMessage,
    #[error("unsupported BMP version {0}")]
    UnsupportedBmpVersion(u8),
    #[error("invalid BMP message length {0}")]
    InvalidMessageLength(u32),
}

impl<T> From<TryFromPrimitiveError<T>> for ParserBmpError
where
    T: TryFromPrimitive,
    ParserError: From<TryFromPrimitiveError<T>>,
{
    fn from(value: TryFromPrimitiveError<T>) -> Self {
        ParserBmpError::ParseError(ParserError::from(value))
    }
}
