/// AS number length: 16 or 32 bits.
///
/// BMP tells which encoding a peer uses through the `A` flag of the per-peer header. Legacy
/// speakers encode `AS_PATH` with 2-octet ASNs and carry the real path in `AS4_PATH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AsnLength {
    Bits16,
    #[default]
    Bits32,
}

impl AsnLength {
    /// Number of bytes one ASN occupies on the wire.
    pub const fn bytes(&self) -> usize {
        match self {
            AsnLength::Bits16 => 2,
            AsnLength::Bits32 => 4,
        }
    }
}
