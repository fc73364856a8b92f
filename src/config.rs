//! Process-wide configuration consumed by the RKE core (spec.md §6).
//!
//! The loader that populates this struct from environment or file is an
//! external collaborator (spec.md §1); this module only defines the
//! shape the rest of the crate depends on, in the style of
//! `network-b/node/src/config.rs` (a plain struct with a `validate`).

use std::path::PathBuf;

/// Configuration consumed by the fragment store, enc-coin loader, and
/// dispatcher.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root path for `RKE/`, `Keys/`, and `coins/`.
    pub cwd: PathBuf,
    /// 16-bit coin id compared against the encryption-coin file header.
    pub coin_id: u16,
}

impl Config {
    pub fn new(cwd: PathBuf, coin_id: u16) -> Self {
        Config { cwd, coin_id }
    }

    /// Paths this crate writes under are well-formed (non-empty root).
    pub fn validate(&self) -> Result<(), String> {
        if self.cwd.as_os_str().is_empty() {
            return Err("cwd must not be empty".to_string());
        }
        Ok(())
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.cwd.join("Keys")
    }

    pub fn coins_dir(&self) -> PathBuf {
        self.cwd.join("coins")
    }
}
