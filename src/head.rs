/// Fixed on-disk size of a head block: four big-endian u64 fields.
pub(crate) const HEAD_SIZE: u64 = 32;

/// File-format magic distinguishing a genuine head block from an
/// unrelated run of bytes the backward scan happens to land on.
pub(crate) const HEAD_MAGIC: u64 = 0x4250_4c55_5354_5231; // "BPLUST R1" (packed)

/// The tree header: branching factor, format magic, and the current
/// root's disk location. Written uncompressed so recovery never depends
/// on a working compressor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Head {
    pub page_size: u64,
    pub hash: u64,
    pub offset: u64,
    pub config: u64,
}

impl Head {
    pub fn encode(&self) -> [u8; HEAD_SIZE as usize] {
        let mut buf = [0u8; HEAD_SIZE as usize];
        buf[0..8].copy_from_slice(&self.page_size.to_be_bytes());
        buf[8..16].copy_from_slice(&self.hash.to_be_bytes());
        buf[16..24].copy_from_slice(&self.offset.to_be_bytes());
        buf[24..32].copy_from_slice(&self.config.to_be_bytes());
        buf
    }

    /// Decodes a candidate head block, returning `None` if it is the wrong
    /// size or its magic does not match — the backward scan treats either
    /// as "keep looking further back".
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != HEAD_SIZE as usize {
            return None;
        }
        let page_size = u64::from_be_bytes(buf[0..8].try_into().ok()?);
        let hash = u64::from_be_bytes(buf[8..16].try_into().ok()?);
        if hash != HEAD_MAGIC {
            return None;
        }
        let offset = u64::from_be_bytes(buf[16..24].try_into().ok()?);
        let config = u64::from_be_bytes(buf[24..32].try_into().ok()?);
        Some(Self { page_size, hash, offset, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let head = Head { page_size: 64, hash: HEAD_MAGIC, offset: 128, config: 17 };
        let bytes = head.encode();
        let decoded = Head::decode(&bytes).unwrap();
        assert_eq!(decoded.page_size, 64);
        assert_eq!(decoded.offset, 128);
        assert_eq!(decoded.config, 17);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = Head { page_size: 64, hash: HEAD_MAGIC, offset: 0, config: 0 }.encode();
        bytes[8] ^= 0xFF;
        assert!(Head::decode(&bytes).is_none());
    }

    #[test]
    fn rejects_wrong_size() {
        assert!(Head::decode(&[0u8; 16]).is_none());
    }
}
