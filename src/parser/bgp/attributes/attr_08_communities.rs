use crate::models::*;
use crate::parser::ReadUtils;
use crate::ParserError;
use bytes::{Buf, Bytes};

/// Communities are kept as raw 32-bit values; well-known communities are not special-cased.
pub fn parse_regular_communities(mut input: Bytes) -> Result<AttributeValue, ParserError> {
    let mut communities = Vec::with_capacity(input.remaining() / 4);

    while input.remaining() > 0 {
        communities.push(input.read_u32()?);
    }

    Ok(AttributeValue::Communities(communities))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test parsing of communities values, as defined in RFC1997.
    #[test]
    fn test_parse_communities() {
        let res = parse_regular_communities(Bytes::from(vec![
            0xFF, 0xFF, 0xFF, 0x01, // NoExport
            0x00, 0x7B, 0x01, 0xC8, // 123:456
        ]))
        .unwrap();
        assert_eq!(
            res,
            AttributeValue::Communities(vec![0xFFFFFF01, (123 << 16) | 456])
        );

        assert!(parse_regular_communities(Bytes::from(vec![0, 1, 2])).is_err());
    }
}
