/*!
bmp-rib collects BGP routes streamed by routers over the BGP Monitoring Protocol (BMP,
[RFC 7854](https://datatracker.ietf.org/doc/html/rfc7854)) into an in-memory RIB, and answers
longest-prefix-match lookups used to enrich flows with AS and community information.

# Layout

- [models]: address families, route distinguishers, BGP messages and attributes
- [parser]: BMP framing and message decoding, including the embedded BGP messages
- [rib]: intern pools, the prefix trie and the route store
- [collector]: exporter sessions, peer lifecycle, RIB updates and lookups

# Example

```no_run
use bmp_rib::{Collector, CollectorConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), bmp_rib::CollectorError> {
    let config = CollectorConfig::from_toml_str(r#"listen = "127.0.0.1:10179""#)?;
    let collector = Arc::new(Collector::new(config));
    tokio::spawn(collector.clone().run());

    let any = "0.0.0.0".parse().unwrap();
    match collector.lookup("192.0.2.10".parse().unwrap(), any, any) {
        Ok(result) => println!("origin AS{}", result.asn),
        Err(err) => println!("{}", err),
    }
    collector.stop();
    Ok(())
}
```
*/

pub mod collector;
pub mod error;
pub mod models;
pub mod parser;
pub mod rib;

pub use collector::{Collector, CollectorConfig, LookupResult};
pub use error::{CollectorError, LookupError, ParserError};
pub use parser::ParserBmpError;
