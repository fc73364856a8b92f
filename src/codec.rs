//! Fixed-layout byte codec for packed records and wire fields.
//!
//! Every record here has a FROZEN on-disk/wire width; field order and
//! endianness are exactly as spec.md §3/§4.F specify. Unlike a tagged
//! serde format, these are plain big-/native-endian packed structures,
//! matching the legacy peers this crate must interoperate with.

use crate::errors::{Result, RkeError};
use crate::types::{Fragment, KeyMetadata, CHECKSUM_LEN, KEY_ID_LEN, MAX_FRAGMENT_DATA};

/// `Fragment` on-disk/wire record length: 1+1+1+2+256+32.
pub const FRAGMENT_RECORD_LEN: usize =
    1 + 1 + 1 + 2 + MAX_FRAGMENT_DATA + CHECKSUM_LEN;

/// `KeyMetadata` on-disk record length: 16+1+1+1+4+1+4.
pub const METADATA_RECORD_LEN: usize = KEY_ID_LEN + 1 + 1 + 1 + 4 + 1 + 4;

impl Fragment {
    /// Serializes to the exact on-disk/wire record (no padding).
    pub fn to_bytes(&self) -> [u8; FRAGMENT_RECORD_LEN] {
        let mut buf = [0u8; FRAGMENT_RECORD_LEN];
        let mut off = 0;
        buf[off] = self.fragment_id;
        off += 1;
        buf[off] = self.total_fragments;
        off += 1;
        buf[off] = self.threshold;
        off += 1;
        buf[off..off + 2].copy_from_slice(&self.fragment_size.to_be_bytes());
        off += 2;
        buf[off..off + MAX_FRAGMENT_DATA].copy_from_slice(&self.data);
        off += MAX_FRAGMENT_DATA;
        buf[off..off + CHECKSUM_LEN].copy_from_slice(&self.checksum);
        buf
    }

    /// Parses exactly `FRAGMENT_RECORD_LEN` bytes into a `Fragment`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != FRAGMENT_RECORD_LEN {
            return Err(RkeError::InvalidPacketLength {
                expected: FRAGMENT_RECORD_LEN.to_string(),
                actual: buf.len(),
            });
        }
        let mut off = 0;
        let fragment_id = buf[off];
        off += 1;
        let total_fragments = buf[off];
        off += 1;
        let threshold = buf[off];
        off += 1;
        let fragment_size = u16::from_be_bytes([buf[off], buf[off + 1]]);
        off += 2;
        let mut data = [0u8; MAX_FRAGMENT_DATA];
        data.copy_from_slice(&buf[off..off + MAX_FRAGMENT_DATA]);
        off += MAX_FRAGMENT_DATA;
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&buf[off..off + CHECKSUM_LEN]);

        Ok(Fragment {
            fragment_id,
            total_fragments,
            threshold,
            fragment_size,
            data,
            checksum,
        })
    }
}

impl KeyMetadata {
    /// Serializes to the exact on-disk record (timestamp native-endian).
    pub fn to_bytes(&self) -> [u8; METADATA_RECORD_LEN] {
        let mut buf = [0u8; METADATA_RECORD_LEN];
        let mut off = 0;
        buf[off..off + KEY_ID_LEN].copy_from_slice(&self.key_id);
        off += KEY_ID_LEN;
        buf[off] = self.key_type;
        off += 1;
        buf[off] = self.total_fragments;
        off += 1;
        buf[off] = self.threshold;
        off += 1;
        buf[off..off + 4].copy_from_slice(&self.timestamp.to_ne_bytes());
        off += 4;
        buf[off] = self.den;
        off += 1;
        buf[off..off + 4].copy_from_slice(&self.sn.to_ne_bytes());
        buf
    }

    /// Parses exactly `METADATA_RECORD_LEN` bytes into `KeyMetadata`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != METADATA_RECORD_LEN {
            return Err(RkeError::InvalidPacketLength {
                expected: METADATA_RECORD_LEN.to_string(),
                actual: buf.len(),
            });
        }
        let mut off = 0;
        let mut key_id = [0u8; KEY_ID_LEN];
        key_id.copy_from_slice(&buf[off..off + KEY_ID_LEN]);
        off += KEY_ID_LEN;
        let key_type = buf[off];
        off += 1;
        let total_fragments = buf[off];
        off += 1;
        let threshold = buf[off];
        off += 1;
        let timestamp = u32::from_ne_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
        off += 4;
        let den = buf[off];
        off += 1;
        let sn = u32::from_ne_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);

        Ok(KeyMetadata {
            key_id,
            key_type,
            total_fragments,
            threshold,
            timestamp,
            den,
            sn,
        })
    }
}

/// Reads a 16-byte array out of `buf` at `offset`, bounds-checked.
pub fn read_key_id(buf: &[u8], offset: usize) -> Result<[u8; KEY_ID_LEN]> {
    if buf.len() < offset + KEY_ID_LEN {
        return Err(RkeError::InvalidPacketLength {
            expected: format!(">= {}", offset + KEY_ID_LEN),
            actual: buf.len(),
        });
    }
    let mut out = [0u8; KEY_ID_LEN];
    out.copy_from_slice(&buf[offset..offset + KEY_ID_LEN]);
    Ok(out)
}

/// Reads a big-endian u32 serial number out of 4 bytes at `offset`.
pub fn read_sn_be(buf: &[u8], offset: usize) -> Result<u32> {
    if buf.len() < offset + 4 {
        return Err(RkeError::InvalidPacketLength {
            expected: format!(">= {}", offset + 4),
            actual: buf.len(),
        });
    }
    Ok(u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_lengths_match_spec() {
        assert_eq!(FRAGMENT_RECORD_LEN, 294);
        assert_eq!(METADATA_RECORD_LEN, 28);
    }

    #[test]
    fn fragment_roundtrips_through_bytes() {
        let mut f = Fragment::zeroed();
        f.fragment_id = 2;
        f.total_fragments = 5;
        f.threshold = 3;
        f.fragment_size = 10;
        f.data[0..10].copy_from_slice(&[7u8; 10]);
        f.checksum = [9u8; CHECKSUM_LEN];

        let bytes = f.to_bytes();
        assert_eq!(bytes.len(), FRAGMENT_RECORD_LEN);
        let parsed = Fragment::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn fragment_from_bytes_rejects_wrong_length() {
        let buf = vec![0u8; FRAGMENT_RECORD_LEN - 1];
        assert!(Fragment::from_bytes(&buf).is_err());
    }

    #[test]
    fn metadata_roundtrips_through_bytes() {
        let meta = KeyMetadata {
            key_id: [1u8; KEY_ID_LEN],
            key_type: 0x01,
            total_fragments: 5,
            threshold: 3,
            timestamp: 1_700_000_000,
            den: 2,
            sn: 42,
        };
        let bytes = meta.to_bytes();
        let parsed = KeyMetadata::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, meta);
    }
}
