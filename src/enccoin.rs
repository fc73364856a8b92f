//! Encryption-coin loader (spec.md §4.E).
//!
//! Reads the legacy 440-byte encryption-coin file and extracts the
//! 400-byte table of 25 per-peer 16-byte authentication secrets.

use std::fs;
use std::path::Path;

use crate::errors::{Result, RkeError};

/// Total size of an encryption-coin file on disk.
pub const COIN_FILE_LEN: usize = 440;
/// Offset at which the 400-byte peer-secret table begins.
const PEER_TABLE_OFFSET: usize = 40;
/// Number of peers in the table.
pub const PEER_COUNT: usize = 25;
/// Width of one peer's authentication secret.
const PEER_SECRET_LEN: usize = 16;

/// Loads `{root}/coins/{den:02x}.{sn}.bin`, validates its coin-id header
/// against `expected_coin_id`, and returns the 400-byte peer-secret table.
pub fn load_enc_coin(root: &Path, den: u8, sn: u32, expected_coin_id: u16) -> Result<[u8; 400]> {
    let path = root.join("coins").join(format!("{:02x}.{}.bin", den, sn));
    let bytes = fs::read(&path).map_err(|e| RkeError::CoinLoad(format!("{:?}: {}", path, e)))?;

    if bytes.len() != COIN_FILE_LEN {
        return Err(RkeError::CoinLoad(format!(
            "coin file {:?} is {} bytes, expected {}",
            path,
            bytes.len(),
            COIN_FILE_LEN
        )));
    }

    let coin_id = ((bytes[2] as u16) << 8) | bytes[3] as u16;
    if coin_id != expected_coin_id {
        return Err(RkeError::CoinLoad(format!(
            "coin_id mismatch: file has {:#06x}, expected {:#06x}",
            coin_id, expected_coin_id
        )));
    }

    let mut table = [0u8; 400];
    table.copy_from_slice(&bytes[PEER_TABLE_OFFSET..PEER_TABLE_OFFSET + 400]);
    Ok(table)
}

/// Extracts peer `d`'s 16-byte authentication secret from a loaded table.
pub fn peer_secret(table: &[u8; 400], d: u8) -> Result<[u8; 16]> {
    if d as usize >= PEER_COUNT {
        return Err(RkeError::InvalidParameter(format!(
            "peer index {} exceeds {}",
            d,
            PEER_COUNT - 1
        )));
    }
    let start = d as usize * PEER_SECRET_LEN;
    let mut out = [0u8; 16];
    out.copy_from_slice(&table[start..start + PEER_SECRET_LEN]);
    Ok(out)
}
