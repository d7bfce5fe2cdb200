/*!
error module defines the error types used in bmp-rib.
*/
use num_enum::{TryFromPrimitive, TryFromPrimitiveError};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    /// This error represents a [num_enum::TryFromPrimitiveError] error for any of a number of
    /// different types.
    ///
    /// ## Occurs during:
    ///  - Parsing of a BMP common header or TLV type
    ///  - Parsing of a BGP message header
    #[error("unrecognized value {value} for {type_name}")]
    UnrecognizedEnumVariant { type_name: &'static str, value: u64 },
    /// This error represents a [ipnet::PrefixLenError] error. It occurs if an address mask is
    /// larger than the length of the address it is being applied to.
    ///
    /// ## Occurs during:
    ///  - Reading network prefixes (parsing of BGP UPDATE NLRI)
    ///  - Normalizing prefixes into the IPv6 space
    #[error("invalid network prefix mask")]
    InvalidPrefixLength(#[from] ipnet::PrefixLenError),
    /// The buffer ended before a fixed-size field could be read.
    #[error("not enough bytes to read")]
    IoNotEnoughBytes(),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("truncated message: {0}")]
    TruncatedMsg(String),
}

impl<T> From<TryFromPrimitiveError<T>> for ParserError
where
    T: TryFromPrimitive,
    T::Primitive: Into<u64>,
{
    #[inline]
    fn from(value: TryFromPrimitiveError<T>) -> Self {
        ParserError::UnrecognizedEnumVariant {
            type_name: T::NAME,
            value: value.number.into(),
        }
    }
}

/// Errors raised while setting up or running the collector.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unable to listen to {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl From<toml::de::Error> for CollectorError {
    fn from(value: toml::de::Error) -> Self {
        CollectorError::Config(value.to_string())
    }
}

/// Errors returned by [crate::collector::Collector::lookup].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no route found")]
    NoRouteFound,
}
