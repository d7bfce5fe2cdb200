mod attr_02_17_as_path;
mod attr_03_next_hop;
mod attr_08_communities;
mod attr_14_15_nlri;
mod attr_32_large_communities;

use bytes::{Buf, Bytes};
use log::{debug, warn};

use crate::models::*;

use crate::error::ParserError;
use crate::parser::bgp::attributes::attr_02_17_as_path::parse_as_path;
use crate::parser::bgp::attributes::attr_03_next_hop::parse_next_hop;
use crate::parser::bgp::attributes::attr_08_communities::parse_regular_communities;
use crate::parser::bgp::attributes::attr_14_15_nlri::parse_nlri;
use crate::parser::bgp::attributes::attr_32_large_communities::parse_large_communities;
use crate::parser::ReadUtils;

pub struct AttributeParser<'a> {
    add_path: &'a AddPathOptions,
}

impl<'a> AttributeParser<'a> {
    pub fn new(add_path: &'a AddPathOptions) -> AttributeParser<'a> {
        AttributeParser { add_path }
    }

    /// Parse BGP attributes given the attributes section of an UPDATE message.
    ///
    /// Attributes the collector does not use are skipped by length. An attribute whose content
    /// cannot be decoded is skipped too and recorded as malformed; only a truncated attribute
    /// section fails the whole message.
    pub fn parse_attributes(
        &self,
        mut data: Bytes,
        asn_len: &AsnLength,
    ) -> Result<Attributes, ParserError> {
        let mut attributes = Attributes::default();

        while data.remaining() >= 3 {
            // each attribute is at least 3 bytes: flag(1) + type(1) + length(1)
            // thus the while loop condition is set to be at least 3 bytes to read.

            // has content to read
            let flag = AttrFlags::from_bits_retain(data.read_u8()?);
            let attr_type = data.read_u8()?;
            let attr_length = match flag.contains(AttrFlags::EXTENDED) {
                false => data.read_u8()? as usize,
                true => data.read_u16()? as usize,
            };

            /*
            https://datatracker.ietf.org/doc/html/rfc4271#section-4.3

            > The third high-order bit (bit 2) of the Attribute Flags octet
            > is the Partial bit.  It defines whether the information
            > contained in the optional transitive attribute is partial (if
            > set to 1) or complete (if set to 0).
            */
            let partial = flag.contains(AttrFlags::PARTIAL);

            debug!(
                "reading attribute: type -- {:?}, length -- {}",
                &attr_type, attr_length
            );

            // we know data has enough bytes to read, so we can split the bytes into a new Bytes object
            data.has_n_remaining(attr_length)?;
            let attr_data = data.split_to(attr_length);

            let attr_type = AttrType::from(attr_type);
            let attr = match attr_type {
                AttrType::AS_PATH => {
                    parse_as_path(attr_data, asn_len).map(|path| AttributeValue::AsPath {
                        path,
                        is_as4: false,
                    })
                }
                AttrType::AS4_PATH => parse_as_path(attr_data, &AsnLength::Bits32)
                    .map(|path| AttributeValue::AsPath { path, is_as4: true }),
                AttrType::NEXT_HOP => parse_next_hop(attr_data),
                AttrType::MP_REACHABLE_NLRI => parse_nlri(attr_data, true, self.add_path),
                AttrType::MP_UNREACHABLE_NLRI => parse_nlri(attr_data, false, self.add_path),
                AttrType::COMMUNITIES => parse_regular_communities(attr_data),
                AttrType::LARGE_COMMUNITIES => parse_large_communities(attr_data),
                _ => {
                    debug!("skipping attribute type {:?}", attr_type);
                    continue;
                }
            };

            match attr {
                Ok(value) => attributes.push(value),
                Err(e) if partial => {
                    // it's ok to have errors when reading partial bytes
                    warn!("PARTIAL: {}", e);
                }
                Err(e) => {
                    warn!("skipping malformed attribute {:?}: {}", attr_type, e);
                    attributes.push_malformed(attr_type);
                }
            };
        }

        Ok(attributes)
    }
}
