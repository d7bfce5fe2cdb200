/*!
Provides parsing of BGP messages carried in BMP.
*/
pub mod attributes;
pub mod messages;
pub use messages::parse_bgp_message;
