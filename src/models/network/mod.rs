//! Common network-related structs.

mod afi;
mod asn;
mod prefix;
mod rd;

pub use afi::*;
pub use asn::*;
pub use prefix::*;
pub use rd::*;
