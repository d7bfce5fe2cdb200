use crate::parser::bmp::error::ParserBmpError;
use crate::parser::ReadUtils;
use bytes::{Buf, Bytes};

#[derive(Debug, PartialEq)]
pub struct PeerDownNotification {
    pub reason: u8,
    pub data: Option<Vec<u8>>,
}

/// <https://www.rfc-editor.org/rfc/rfc7854#section-4.9>
pub fn parse_peer_down_notification(
    data: &mut Bytes,
) -> Result<PeerDownNotification, ParserBmpError> {
    let reason = data.read_u8()?;
    let bytes_left = data.remaining();
    let data: Option<Vec<u8>> = match reason {
        /*
        1: The local system closed the session. Following the Reason is a BGP PDU containing a
           BGP NOTIFICATION message that would have been sent to the peer.
        2: The local system closed the session. No notification message was sent. Following the
           reason code is a 2-byte field containing the code corresponding to the FSM Event.
        3: The remote system closed the session with a notification message. Following the
           Reason is a BGP PDU containing the BGP NOTIFICATION message as received from the peer.
        6: Peer de-configured, followed by TLVs (RFC 9069).
        */
        1..=3 | 6 => Some(data.read_n_bytes(bytes_left)?),
        /*
        4: The remote system closed the session without a notification message.
        5: Information for this peer will no longer be sent to the monitoring station for
           configuration reasons.
        */
        4 | 5 => None,
        _ => {
            // unknown reasons still take the peer down, their data is skipped
            data.advance(bytes_left);
            None
        }
    };
    Ok(PeerDownNotification { reason, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_parse_peer_down_notification() {
        // Test with reason `1`
        let mut data = bytes::BytesMut::new();
        data.put_u8(1);
        data.put_slice(&[0u8; 10]);
        let mut data = data.freeze();
        let peer_down_notification = parse_peer_down_notification(&mut data).unwrap();
        assert_eq!(peer_down_notification.reason, 1);
        assert_eq!(peer_down_notification.data.unwrap(), vec![0u8; 10]);

        // Test with reason `4`
        let mut data = Bytes::from_static(&[4]);
        let peer_down_notification = parse_peer_down_notification(&mut data).unwrap();
        assert_eq!(peer_down_notification.reason, 4);
        assert_eq!(peer_down_notification.data, None);

        // Test with an unknown reason
        let mut data = Bytes::from_static(&[42, 0, 1]);
        let peer_down_notification = parse_peer_down_notification(&mut data).unwrap();
        assert_eq!(peer_down_notification.reason, 42);
        assert_eq!(peer_down_notification.data, None);
        assert!(data.is_empty());
    }
}
