use crate::parser::bmp::error::ParserBmpError;
use crate::parser::ReadUtils;
use bytes::{Buf, Bytes};
use num_enum::{FromPrimitive, IntoPrimitive};

#[derive(Debug)]
pub struct TerminationMessage {
    pub tlvs: Vec<TerminationTlv>,
}

impl TerminationMessage {
    /// Human readable reason: the first string TLV, or the decoded reason code.
    pub fn reason(&self) -> Option<String> {
        let text = self.tlvs.iter().find_map(|tlv| match &tlv.value {
            TerminationTlvValue::String(s) => Some(s.clone()),
            TerminationTlvValue::Reason(_) => None,
        });
        text.or_else(|| {
            self.tlvs.iter().find_map(|tlv| match &tlv.value {
                TerminationTlvValue::Reason(code) => Some(termination_reason(*code).to_string()),
                TerminationTlvValue::String(_) => None,
            })
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct TerminationTlv {
    pub info_type: TerminationTlvType,
    pub info_len: u16,
    pub value: TerminationTlvValue,
}

#[derive(Debug, PartialEq)]
pub enum TerminationTlvValue {
    String(String),
    Reason(u16),
}

///Type-Length-Value Type
///
/// <https://www.rfc-editor.org/rfc/rfc7854#section-4.5>
#[derive(Debug, FromPrimitive, IntoPrimitive, PartialEq, Clone, Copy)]
#[repr(u16)]
pub enum TerminationTlvType {
    String = 0,
    Reason = 1,
    #[num_enum(catch_all)]
    Other(u16),
}

fn termination_reason(code: u16) -> &'static str {
    match code {
        0 => "session administratively closed",
        1 => "unspecified reason",
        2 => "out of resources",
        3 => "redundant connection",
        4 => "session permanently administratively closed",
        _ => "unknown reason",
    }
}

pub fn parse_termination_message(data: &mut Bytes) -> Result<TerminationMessage, ParserBmpError> {
    let mut tlvs = vec![];

    while data.remaining() >= 4 {
        let info_type = TerminationTlvType::from(data.read_u16()?);
        let info_len = data.read_u16()?;
        if data.remaining() < info_len as usize {
            // not enough bytes to read
            break;
        }
        let mut info = data.split_to(info_len as usize);
        let value = match info_type {
            TerminationTlvType::Reason if info_len == 2 => {
                TerminationTlvValue::Reason(info.read_u16()?)
            }
            _ => TerminationTlvValue::String(info.read_n_bytes_to_string(info_len as usize)?),
        };
        tlvs.push(TerminationTlv {
            info_type,
            info_len,
            value,
        })
    }

    Ok(TerminationMessage { tlvs })
}
