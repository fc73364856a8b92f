//! Fragment and metadata persistence (spec.md §4.C).
//!
//! Path scheme: fragments and metadata for a key live under a directory
//! named after the first 4 bytes of the key id (a 32-bit fan-out), so
//! distinct key ids sharing a prefix share a directory; metadata carries
//! the full key id so loads can detect a collision (`LoadMismatch`).
//!
//! Grounded on `network-b/state/src/accounts.rs`'s shape (a struct
//! wrapping a root path, methods returning a crate-local error, `new`
//! taking `impl AsRef<Path>`) adapted from a redb table store to plain
//! files, since the wire format here is a fixed directory/file scheme.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{FRAGMENT_RECORD_LEN, METADATA_RECORD_LEN};
use crate::errors::{Result, RkeError};
use crate::types::{Fragment, KeyId, KeyMetadata, MAX_FRAGMENTS};

/// Storage operations the splitter/reconstructor and dispatcher depend on.
///
/// A trait seam (matching the teacher's `BlockchainReader` pattern in
/// `network-b/rpc/src/server.rs`) so handlers can be exercised against an
/// in-memory fake in tests without touching the filesystem.
pub trait FragmentStore {
    fn store_fragment(&self, fragment: &Fragment, key_id: &KeyId) -> Result<()>;
    fn load_fragment(&self, key_id: &KeyId, fragment_id: u8) -> Result<Fragment>;
    fn store_metadata(&self, meta: &KeyMetadata) -> Result<()>;
    fn load_metadata(&self, key_id: &KeyId) -> Result<KeyMetadata>;
    fn fragment_exists(&self, key_id: &KeyId, fragment_id: u8) -> bool;
    fn count_fragments(&self, key_id: &KeyId) -> usize;
}

/// Filesystem-backed `FragmentStore` rooted at a configured working
/// directory (`{root}/RKE/...`, per spec.md §4.C).
pub struct FsFragmentStore {
    root: PathBuf,
}

impl FsFragmentStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        FsFragmentStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn key_dir(&self, key_id: &KeyId) -> PathBuf {
        self.root.join("RKE").join(format!(
            "{:02x}{:02x}{:02x}{:02x}",
            key_id[0], key_id[1], key_id[2], key_id[3]
        ))
    }

    fn fragment_path(&self, key_id: &KeyId, fragment_id: u8) -> PathBuf {
        self.key_dir(key_id)
            .join(format!("fragment_{:03}.bin", fragment_id))
    }

    fn metadata_path(&self, key_id: &KeyId) -> PathBuf {
        self.key_dir(key_id).join("metadata.bin")
    }

    fn ensure_dir(&self, key_id: &KeyId) -> Result<PathBuf> {
        let dir = self.key_dir(key_id);
        fs::create_dir_all(&dir)?;
        set_dir_mode(&dir, 0o755);
        Ok(dir)
    }

    fn write_record(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        set_file_mode(path, 0o640);
        file.write_all(bytes)?;
        Ok(())
    }

    fn read_record(&self, path: &Path, expected_len: usize) -> Result<Vec<u8>> {
        let mut file = fs::File::open(path)?;
        let mut buf = Vec::with_capacity(expected_len);
        file.read_to_end(&mut buf)?;
        if buf.len() != expected_len {
            return Err(RkeError::Filesystem(format!(
                "short record at {:?}: got {} bytes, expected {}",
                path,
                buf.len(),
                expected_len
            )));
        }
        Ok(buf)
    }
}

impl FragmentStore for FsFragmentStore {
    fn store_fragment(&self, fragment: &Fragment, key_id: &KeyId) -> Result<()> {
        fragment.validate()?;
        self.ensure_dir(key_id)?;
        let path = self.fragment_path(key_id, fragment.fragment_id);
        self.write_record(&path, &fragment.to_bytes())?;
        debug!(fragment_id = fragment.fragment_id, ?path, "stored fragment");
        Ok(())
    }

    fn load_fragment(&self, key_id: &KeyId, fragment_id: u8) -> Result<Fragment> {
        let path = self.fragment_path(key_id, fragment_id);
        let bytes = self.read_record(&path, FRAGMENT_RECORD_LEN)?;
        let fragment = Fragment::from_bytes(&bytes)?;
        fragment.validate()?;
        if fragment.fragment_id != fragment_id {
            warn!(
                expected = fragment_id,
                actual = fragment.fragment_id,
                "fragment id mismatch on load"
            );
            return Err(RkeError::LoadMismatch);
        }
        Ok(fragment)
    }

    fn store_metadata(&self, meta: &KeyMetadata) -> Result<()> {
        self.ensure_dir(&meta.key_id)?;
        let path = self.metadata_path(&meta.key_id);
        self.write_record(&path, &meta.to_bytes())?;
        debug!(key_id = ?hex::encode(meta.key_id), ?path, "stored metadata");
        Ok(())
    }

    fn load_metadata(&self, key_id: &KeyId) -> Result<KeyMetadata> {
        let path = self.metadata_path(key_id);
        let bytes = self.read_record(&path, METADATA_RECORD_LEN)?;
        let meta = KeyMetadata::from_bytes(&bytes)?;
        if &meta.key_id != key_id {
            warn!("metadata key_id mismatch on load");
            return Err(RkeError::LoadMismatch);
        }
        Ok(meta)
    }

    fn fragment_exists(&self, key_id: &KeyId, fragment_id: u8) -> bool {
        self.fragment_path(key_id, fragment_id).exists()
    }

    fn count_fragments(&self, key_id: &KeyId) -> usize {
        (1..=MAX_FRAGMENTS as u8)
            .filter(|&id| self.fragment_exists(key_id, id))
            .count()
    }
}

#[cfg(unix)]
fn set_dir_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(mode);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path, _mode: u32) {}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(mode);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _mode: u32) {}
