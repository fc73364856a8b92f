//! Typed error definitions for the RKE command path.
//!
//! Handlers never panic: every fallible operation returns a typed
//! `RkeError`, which carries the wire status code the dispatcher writes
//! into `ConnCtx::command_status`.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RkeError>;

/// RKE command-path errors, one variant per wire status code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RkeError {
    #[error("invalid packet length: got {actual}, expected {expected}")]
    InvalidPacketLength { expected: String, actual: usize },

    #[error("invalid serial number or denomination: den={den} sn={sn}")]
    InvalidSnOrDen { den: u8, sn: u32 },

    #[error("memory allocation failed: {0}")]
    MemoryAlloc(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("encryption-coin file malformed: {0}")]
    CoinLoad(String),

    #[error("coin block count is not a multiple of the block size")]
    CoinsNotDiv,

    #[error("invalid key start: ks={ks} kl={kl} exceeds 127 bytes")]
    InvalidKeyStart { ks: u8, kl: u8 },

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("key splitting parameters invalid: {0}")]
    KeySplitting(String),

    #[error("fragment corrupt: {0}")]
    FragmentCorrupt(String),

    #[error("insufficient fragments: have {have}, need {need}")]
    InsufficientFragments { have: usize, need: usize },

    #[error("loaded record key_id does not match lookup key_id")]
    LoadMismatch,

    #[error("secure random source failed: {0}")]
    CryptoFail(String),
}

impl RkeError {
    /// Wire status code, per the RKE protocol's response envelope.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::InvalidPacketLength { .. } => -1,
            Self::InvalidSnOrDen { .. } => -2,
            Self::MemoryAlloc(_) => -3,
            Self::InvalidParameter(_) => -4,
            Self::Filesystem(_) => -5,
            Self::CoinLoad(_) => -6,
            Self::CoinsNotDiv => -7,
            Self::InvalidKeyStart { .. } => -10,
            Self::KeyGeneration(_) => -11,
            Self::KeySplitting(_) => -12,
            // The wire protocol has no dedicated codes for these; they
            // surface through the same channel as KeyGeneration failures.
            Self::FragmentCorrupt(_) => -11,
            Self::InsufficientFragments { .. } => -11,
            Self::LoadMismatch => -5,
            Self::CryptoFail(_) => -3,
        }
    }
}

impl From<std::io::Error> for RkeError {
    fn from(err: std::io::Error) -> Self {
        RkeError::Filesystem(err.to_string())
    }
}
