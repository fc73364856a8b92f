//! End-to-end scenarios covering a generate/exchange/reconstruct round
//! trip, corruption detection, and the encryption-coin commit protocol.

use rke_core::authpage::{AuthenticityPage, AuthenticityStore, RECORD_LEN};
use rke_core::config::Config;
use rke_core::crypto::stream_xor;
use rke_core::dispatch::{
    handle_decrypt_raida_key, handle_get_key, handle_post_key, handle_rke_exchange,
    handle_rke_generate, handle_rke_query, handle_rke_reconstruct,
};
use rke_core::store::FsFragmentStore;
use rke_core::types::{ConnCtx, KeyMetadata};
use std::collections::HashMap;
use std::fs;
use tempfile::tempdir;

/// Minimal in-memory `AuthenticityStore` for the decrypt_raida_key
/// scenarios below; the crate's own fake lives behind `#[cfg(test)]` and
/// isn't visible from an external integration test binary.
struct MemPage<'a> {
    data: &'a mut [u8; RECORD_LEN],
    dirty: &'a mut bool,
}

impl<'a> AuthenticityPage for MemPage<'a> {
    fn read_record(&self, _sn_idx: usize) -> [u8; RECORD_LEN] {
        *self.data
    }

    fn write_half(&mut self, _sn_idx: usize, split_id: u8, half: &[u8; 8], mfs: u8) {
        let off = split_id as usize * 8;
        self.data[off..off + 8].copy_from_slice(half);
        self.data[16] = mfs;
    }

    fn mark_dirty(&mut self) {
        *self.dirty = true;
    }
}

struct MemAuthStore {
    records: HashMap<(u8, u32), [u8; RECORD_LEN]>,
    dirty: HashMap<(u8, u32), bool>,
    mfs: u8,
}

impl MemAuthStore {
    fn new(mfs: u8) -> Self {
        MemAuthStore {
            records: HashMap::new(),
            dirty: HashMap::new(),
            mfs,
        }
    }

    fn seed(&mut self, den: u8, sn: u32, record: [u8; RECORD_LEN]) {
        self.records.insert((den, sn), record);
        self.dirty.insert((den, sn), false);
    }

    fn is_dirty(&self, den: u8, sn: u32) -> bool {
        self.dirty.get(&(den, sn)).copied().unwrap_or(false)
    }
}

impl AuthenticityStore for MemAuthStore {
    type Page<'a>
        = MemPage<'a>
    where
        Self: 'a;

    fn take_lock(&mut self, den: u8, sn: u32) -> Option<Self::Page<'_>> {
        let dirty = self.dirty.get_mut(&(den, sn))?;
        let data = self.records.get_mut(&(den, sn))?;
        Some(MemPage { data, dirty })
    }

    fn current_mfs(&self) -> u8 {
        self.mfs
    }
}

fn generate_body(key_id: [u8; 16], n: u8, t: u8) -> Vec<u8> {
    let mut body = vec![0u8; 21];
    body[0..16].copy_from_slice(&key_id);
    body[16] = 0x01;
    body[17] = n;
    body[18] = t;
    body
}

/// S1: generate a key, then query it back and confirm every fragment
/// the handler wrote is reflected in the presence bitmap.
#[test]
fn s1_generate_then_query_reports_every_fragment_present() {
    let dir = tempdir().unwrap();
    let store = FsFragmentStore::new(dir.path());
    let key_id = [7u8; 16];

    let mut gen_ctx = ConnCtx::new(generate_body(key_id, 6, 4), [0u8; 16]);
    handle_rke_generate(&mut gen_ctx, &store);
    assert_eq!(gen_ctx.command_status, 0);

    let mut query_body = vec![0u8; 18];
    query_body[0..16].copy_from_slice(&key_id);
    let mut query_ctx = ConnCtx::new(query_body, [0u8; 16]);
    handle_rke_query(&mut query_ctx, &store);
    assert_eq!(query_ctx.command_status, 0);

    let meta = KeyMetadata::from_bytes(&query_ctx.output[0..28]).unwrap();
    assert_eq!(meta.total_fragments, 6);
    assert_eq!(meta.threshold, 4);

    let bitmap = &query_ctx.output[28..60];
    for i in 0..6u8 {
        assert_eq!(bitmap[i as usize / 8] & (1 << (i % 8)), 1 << (i % 8));
    }
}

/// S2: generate, exchange every fragment individually, then reconstruct
/// via the handler path and confirm the same fragments reassemble.
#[test]
fn s2_generate_exchange_reconstruct_roundtrip() {
    let dir = tempdir().unwrap();
    let store = FsFragmentStore::new(dir.path());
    let key_id = [3u8; 16];

    let mut gen_ctx = ConnCtx::new(generate_body(key_id, 4, 2), [0u8; 16]);
    handle_rke_generate(&mut gen_ctx, &store);
    assert_eq!(gen_ctx.command_status, 0);

    for fragment_id in 1..=4u8 {
        let mut exch_body = vec![0u8; 19];
        exch_body[0..16].copy_from_slice(&key_id);
        exch_body[16] = fragment_id;
        let mut exch_ctx = ConnCtx::new(exch_body, [0u8; 16]);
        handle_rke_exchange(&mut exch_ctx, &store);
        assert_eq!(exch_ctx.command_status, 0);
        assert_eq!(exch_ctx.output.len(), 294);
    }

    let mut recon_body = vec![0u8; 18];
    recon_body[0..16].copy_from_slice(&key_id);
    let mut recon_ctx = ConnCtx::new(recon_body, [0u8; 16]);
    handle_rke_reconstruct(&mut recon_ctx, &store);
    assert_eq!(recon_ctx.command_status, 0);
    assert_eq!(recon_ctx.output.len(), 256);
}

/// S3: corrupting one on-disk fragment record fails reconstruction.
#[test]
fn s3_corrupted_fragment_on_disk_fails_reconstruction() {
    let dir = tempdir().unwrap();
    let store = FsFragmentStore::new(dir.path());
    let key_id = [5u8; 16];

    let mut gen_ctx = ConnCtx::new(generate_body(key_id, 3, 2), [0u8; 16]);
    handle_rke_generate(&mut gen_ctx, &store);
    assert_eq!(gen_ctx.command_status, 0);

    let fragment_dir = dir.path().join("RKE").join("05050505");
    let fragment_path = fragment_dir.join("fragment_001.bin");
    let mut bytes = fs::read(&fragment_path).unwrap();
    bytes[10] ^= 0xFF;
    fs::write(&fragment_path, bytes).unwrap();

    let mut recon_body = vec![0u8; 18];
    recon_body[0..16].copy_from_slice(&key_id);
    let mut recon_ctx = ConnCtx::new(recon_body, [0u8; 16]);
    handle_rke_reconstruct(&mut recon_ctx, &store);
    assert_ne!(recon_ctx.command_status, 0);
}

/// S4/S5: a fabricated encryption-coin commit is accepted when its
/// binding matches and rejected when the denomination is tampered with.
#[test]
fn s4_s5_decrypt_raida_key_accepts_valid_and_rejects_tampered_binding() {
    let dir = tempdir().unwrap();
    let config = Config::new(dir.path().to_path_buf(), 0xBEEF);
    let mut auth = MemAuthStore::new(1);

    let coins_dir = dir.path().join("coins");
    fs::create_dir_all(&coins_dir).unwrap();
    let mut coin_file = vec![0u8; 440];
    coin_file[2] = 0xBE;
    coin_file[3] = 0xEF;
    let peer_secret = [0x22u8; 16];
    coin_file[40..56].copy_from_slice(&peer_secret);
    fs::write(coins_dir.join("01.500.bin"), coin_file).unwrap();

    let den = 9u8;
    let sn = 42u32;
    auth.seed(den, sn, [0u8; 17]);

    let build_body = |tamper_den: bool| {
        let mut key_block = [0u8; 16];
        key_block[8] = if tamper_den { den.wrapping_add(1) } else { den };
        key_block[9..13].copy_from_slice(&sn.to_be_bytes());
        key_block[15] = 0xff;
        stream_xor(&peer_secret, &[0u8; 16], &mut key_block);

        let mut body = vec![0u8; 21 + 26 + 2];
        body[0] = 1; // outer den
        body[1..5].copy_from_slice(&500u32.to_be_bytes()); // outer sn
        let base = 21;
        body[base + 2] = 0; // split_id
        body[base + 3] = 0; // da (peer index)
        body[base + 5] = den;
        body[base + 6..base + 10].copy_from_slice(&sn.to_be_bytes());
        body[base + 10..base + 26].copy_from_slice(&key_block);
        body
    };

    let mut accept_ctx = ConnCtx::new(build_body(false), [0u8; 16]);
    handle_decrypt_raida_key(&mut accept_ctx, &mut auth, &config);
    assert_eq!(accept_ctx.command_status, 0);
    assert_eq!(accept_ctx.output, vec![0x01]);
    assert!(auth.is_dirty(den, sn));

    let mut auth2 = MemAuthStore::new(1);
    auth2.seed(den, sn, [0u8; 17]);
    let mut reject_ctx = ConnCtx::new(build_body(true), [0u8; 16]);
    handle_decrypt_raida_key(&mut reject_ctx, &mut auth2, &config);
    assert_eq!(reject_ctx.command_status, 0);
    assert_eq!(reject_ctx.output, vec![0x00]);
}

/// S6: posting key material and getting it back returns the same bytes
/// under the den/sn framing the handler writes.
#[test]
fn s6_post_key_then_get_key_roundtrip() {
    let dir = tempdir().unwrap();
    let config = Config::new(dir.path().to_path_buf(), 1);
    let key_id = [0x99u8; 16];

    let mut post_body = vec![0u8; 185];
    post_body[0..16].copy_from_slice(&key_id);
    post_body[32] = 3; // den
    post_body[33..37].copy_from_slice(&99u32.to_be_bytes()); // sn
    let material = b"sixteen-byte-key";
    post_body[37..37 + material.len()].copy_from_slice(material);
    post_body[165] = 0; // ks
    post_body[166] = material.len() as u8; // kl

    let mut post_ctx = ConnCtx::new(post_body, [0u8; 16]);
    handle_post_key(&mut post_ctx, &config);
    assert_eq!(post_ctx.command_status, 0);

    let mut get_body = vec![0u8; 55];
    get_body[0..16].copy_from_slice(&key_id);
    let mut get_ctx = ConnCtx::new(get_body, [0u8; 16]);
    handle_get_key(&mut get_ctx, &config);
    assert_eq!(get_ctx.command_status, 0);
    assert_eq!(get_ctx.output[0], 3);
    assert_eq!(&get_ctx.output[1..5], &99u32.to_be_bytes());
    assert_eq!(&get_ctx.output[5..], material);
}

/// `get_key` against a key that was never posted surfaces a filesystem
/// error rather than silently creating an empty file.
#[test]
fn get_key_on_missing_key_fails_instead_of_creating_one() {
    let dir = tempdir().unwrap();
    let config = Config::new(dir.path().to_path_buf(), 1);

    let mut get_body = vec![0u8; 55];
    get_body[0..16].copy_from_slice(&[0xABu8; 16]);
    let mut get_ctx = ConnCtx::new(get_body, [0u8; 16]);
    handle_get_key(&mut get_ctx, &config);

    assert_ne!(get_ctx.command_status, 0);
    assert!(!config.keys_dir().join(hex::encode([0xABu8; 16])).exists());
}
