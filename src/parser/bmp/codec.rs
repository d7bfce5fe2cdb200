use crate::parser::bmp::error::ParserBmpError;
use crate::parser::bmp::messages::*;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// Upper bound on a single BMP message, well above a route monitoring message carrying an
/// extended BGP message (RFC 8654).
const MAX_BMP_MESSAGE_LEN: usize = 1 << 20;

/// One BMP message: its common header and the raw bytes that follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct BmpFrame {
    pub header: BmpCommonHeader,
    pub body: Bytes,
}

/// Splits a TCP stream into BMP messages using the length of the common header.
#[derive(Debug, Default)]
pub struct BmpCodec;

impl Decoder for BmpCodec {
    type Item = BmpFrame;
    type Error = ParserBmpError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < BMP_COMMON_HEADER_LEN {
            return Ok(None);
        }
        let mut header_bytes = Bytes::copy_from_slice(&buf[..BMP_COMMON_HEADER_LEN]);
        let header = parse_bmp_common_header(&mut header_bytes)?;
        let msg_len = header.msg_len as usize;
        if msg_len > MAX_BMP_MESSAGE_LEN {
            return Err(ParserBmpError::InvalidMessageLength(header.msg_len));
        }
        if buf.len() < msg_len {
            buf.reserve(msg_len - buf.len());
            return Ok(None);
        }

        let mut body = buf.split_to(msg_len).freeze();
        body.advance(BMP_COMMON_HEADER_LEN);
        Ok(Some(BmpFrame { header, body }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_decode_frames() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[3, 0, 0, 0, 14, 4]);
        buf.put_slice(&[0, 2, 0, 4, b'e', b'd', b'g', b'e']);
        // first bytes of the next message
        buf.put_slice(&[3, 0, 0, 0, 10, 5, 0]);

        let mut codec = BmpCodec;
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.header.msg_type, BmpMsgType::InitiationMessage);
        assert_eq!(frame.body.len(), 8);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.put_slice(&[1, 0, 2]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.header.msg_type, BmpMsgType::TerminationMessage);
        assert_eq!(frame.body.as_ref(), &[0, 1, 0, 2]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_errors() {
        let mut codec = BmpCodec;
        let mut buf = BytesMut::from(&[1u8, 0, 0, 0, 6, 4][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ParserBmpError::UnsupportedBmpVersion(1))
        ));

        let mut buf = BytesMut::from(&[3u8, 0xff, 0, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ParserBmpError::InvalidMessageLength(_))
        ));
    }
}
