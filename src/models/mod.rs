/*!
Structs for BGP and BMP data handled by the collector.

- [network]: address families, route distinguishers and prefixes
- [bgp]: BGP messages, capabilities and path attributes
*/
pub mod bgp;
pub mod network;

pub use bgp::*;
pub use network::*;
