//! Core data structures for the RKE subsystem.
//!
//! Field order and widths here are FROZEN: they mirror the wire/on-disk
//! layout byte-for-byte (see `codec.rs`). Changing a field's position
//! breaks compatibility with existing fragment/metadata files.

use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum bytes of meaningful data a single fragment can carry.
pub const MAX_FRAGMENT_DATA: usize = 256;
/// Largest legal fragment id / total_fragments value.
pub const MAX_FRAGMENTS: usize = 255;
/// Width of a fragment checksum, in bytes.
pub const CHECKSUM_LEN: usize = 32;
/// Width of a key identifier, in bytes.
pub const KEY_ID_LEN: usize = 16;

/// 16 opaque bytes naming a split key across all peers and records.
pub type KeyId = [u8; KEY_ID_LEN];

/// Recognized `KeyMetadata::key_type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyType {
    Symmetric = 0x01,
    Ephemeral = 0x02,
}

impl KeyType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Symmetric),
            0x02 => Some(Self::Ephemeral),
            _ => None,
        }
    }
}

/// One share of a split key, stored independently of its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 1..=total_fragments
    pub fragment_id: u8,
    /// N, the total number of fragments this key was split into.
    pub total_fragments: u8,
    /// T, the threshold value carried for wire compatibility (see §9: the
    /// split algorithm is all-shares, not true (T, N) threshold).
    pub threshold: u8,
    /// Meaningful length of `data`, <= MAX_FRAGMENT_DATA.
    pub fragment_size: u16,
    /// Fixed-width payload; only `data[..fragment_size]` is meaningful.
    pub data: [u8; MAX_FRAGMENT_DATA],
    /// content_hash() over the preceding fields, truncated appropriately.
    pub checksum: [u8; CHECKSUM_LEN],
}

impl Fragment {
    /// Zeroed fragment record, used as a scratch value before filling.
    pub fn zeroed() -> Self {
        Fragment {
            fragment_id: 0,
            total_fragments: 0,
            threshold: 0,
            fragment_size: 0,
            data: [0u8; MAX_FRAGMENT_DATA],
            checksum: [0u8; CHECKSUM_LEN],
        }
    }

    /// Field-range invariants from spec §3: `fragment_id in [1, total]`,
    /// `threshold <= total`, `fragment_size <= 256`.
    pub fn validate(&self) -> crate::errors::Result<()> {
        use crate::errors::RkeError;
        if self.fragment_size as usize > MAX_FRAGMENT_DATA {
            return Err(RkeError::KeySplitting(format!(
                "fragment_size {} exceeds {}",
                self.fragment_size, MAX_FRAGMENT_DATA
            )));
        }
        if self.fragment_id == 0 || self.fragment_id > self.total_fragments {
            return Err(RkeError::KeySplitting(format!(
                "fragment_id {} out of range [1, {}]",
                self.fragment_id, self.total_fragments
            )));
        }
        if self.threshold > self.total_fragments {
            return Err(RkeError::KeySplitting(format!(
                "threshold {} exceeds total_fragments {}",
                self.threshold, self.total_fragments
            )));
        }
        Ok(())
    }
}

/// Per-key metadata persisted alongside a key's fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMetadata {
    pub key_id: KeyId,
    pub key_type: u8,
    pub total_fragments: u8,
    pub threshold: u8,
    /// seconds since epoch, host byte order as written
    pub timestamp: u32,
    /// owning coin denomination
    pub den: u8,
    /// owning coin serial
    pub sn: u32,
}

impl KeyMetadata {
    pub fn new(key_id: KeyId, key_type: u8, total_fragments: u8, threshold: u8) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        KeyMetadata {
            key_id,
            key_type,
            total_fragments,
            threshold,
            timestamp,
            den: 0,
            sn: 0,
        }
    }
}

/// Session state, per spec.md §3/§4.G.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Active,
    Complete,
    Expired,
}

/// Stateless-per-request session identity binding sender/receiver IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: [u8; 16],
    pub sender_id: [u8; 16],
    pub receiver_id: [u8; 16],
    pub state: SessionState,
    /// Absolute seconds at which the session is considered expired.
    pub timeout: u64,
}

/// Per-request connection context passed into every command handler.
///
/// `output` is allocated by the handler and owned by the outer framework
/// once the handler returns (see spec §9, "Ownership of response buffers").
pub struct ConnCtx {
    pub body: Vec<u8>,
    pub output: Vec<u8>,
    pub command_status: i32,
    pub nonce: [u8; 16],
}

impl ConnCtx {
    pub fn new(body: Vec<u8>, nonce: [u8; 16]) -> Self {
        ConnCtx {
            body,
            output: Vec::new(),
            command_status: 0,
            nonce,
        }
    }

    pub fn body_size(&self) -> usize {
        self.body.len()
    }

    pub fn output_size(&self) -> usize {
        self.output.len()
    }

    /// Records success: sets status to 0 and installs the output buffer.
    pub fn succeed(&mut self, output: Vec<u8>) {
        self.command_status = 0;
        self.output = output;
    }

    /// Records failure: sets status from the error and clears output.
    pub fn fail(&mut self, err: &crate::errors::RkeError) {
        self.command_status = err.status_code();
        self.output.clear();
    }
}
