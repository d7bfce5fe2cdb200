/*!
Decoding of BMP messages and the BGP messages they carry.
*/
pub mod bgp;
pub mod bmp;
pub mod utils;

pub use self::utils::*;
pub use bgp::parse_bgp_message;
pub use bmp::error::ParserBmpError;
