/// Fixed header size of a serialized KV: three big-endian u64 fields
/// (`length`, `offset`, `config`) preceding the raw key bytes.
pub(crate) const KV_HEADER_SIZE: u64 = 24;

/// A key/child-or-value entry inside a page.
///
/// `key` always holds the comparator key, never the user's value payload —
/// the value itself lives out-of-line, addressed by `offset`/`config`. For
/// internal-node entries those fields locate a child page; for leaf
/// entries they locate a value blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Kv {
    pub key: Vec<u8>,
    pub offset: u64,
    pub config: u64,
}

impl Kv {
    pub fn size(&self) -> u64 {
        KV_HEADER_SIZE + self.key.len() as u64
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.key.len() as u64).to_be_bytes());
        buf.extend_from_slice(&self.offset.to_be_bytes());
        buf.extend_from_slice(&self.config.to_be_bytes());
        buf.extend_from_slice(&self.key);
    }

    /// Decodes one KV starting at `buf[pos..]`. Returns the entry and the
    /// number of bytes consumed, or `None` if the buffer is too short to
    /// hold a complete entry (a torn page, which callers treat as corrupt).
    pub fn decode_at(buf: &[u8], pos: usize) -> Option<(Self, usize)> {
        if pos + KV_HEADER_SIZE as usize > buf.len() {
            return None;
        }
        let length = u64::from_be_bytes(buf[pos..pos + 8].try_into().ok()?) as usize;
        let offset = u64::from_be_bytes(buf[pos + 8..pos + 16].try_into().ok()?);
        let config = u64::from_be_bytes(buf[pos + 16..pos + 24].try_into().ok()?);
        let start = pos + KV_HEADER_SIZE as usize;
        if start + length > buf.len() {
            return None;
        }
        let key = buf[start..start + length].to_vec();
        Some((Self { key, offset, config }, KV_HEADER_SIZE as usize + length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_entry() {
        let kv = Kv { key: b"hello".to_vec(), offset: 128, config: 42 };
        let mut buf = Vec::new();
        kv.encode_into(&mut buf);
        assert_eq!(buf.len(), kv.size() as usize);
        let (decoded, used) = Kv::decode_at(&buf, 0).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(decoded, kv);
    }

    #[test]
    fn empty_key_round_trips() {
        let kv = Kv { key: Vec::new(), offset: 0, config: 0 };
        let mut buf = Vec::new();
        kv.encode_into(&mut buf);
        assert_eq!(buf.len(), KV_HEADER_SIZE as usize);
        let (decoded, used) = Kv::decode_at(&buf, 0).unwrap();
        assert_eq!(used, KV_HEADER_SIZE as usize);
        assert_eq!(decoded, kv);
    }

    #[test]
    fn truncated_buffer_fails_to_decode() {
        let kv = Kv { key: b"longer-key".to_vec(), offset: 1, config: 1 };
        let mut buf = Vec::new();
        kv.encode_into(&mut buf);
        buf.truncate(buf.len() - 1);
        assert!(Kv::decode_at(&buf, 0).is_none());
    }
}
