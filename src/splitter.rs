//! Key splitting and reconstruction (spec.md §4.D).
//!
//! The scheme is an additive all-shares XOR split, NOT a true (T, N)
//! threshold scheme: reconstruction requires every fragment that was
//! produced by `split`, regardless of the `threshold` value carried on
//! the wire. This divergence from "threshold" terminology is load-bearing
//! (spec.md §9) for bug-compatibility with fragments already in the
//! field; do not "optimize" reconstruction to read only `threshold`
//! fragments.

use crate::crypto::{content_hash, digests_equal, random_bytes};
use crate::errors::{Result, RkeError};
use crate::store::FragmentStore;
use crate::types::{Fragment, KeyMetadata, CHECKSUM_LEN, MAX_FRAGMENT_DATA};

/// Builds the checksum hash input: header fields plus meaningful data.
fn checksum_input(fragment: &Fragment) -> Vec<u8> {
    let mut input = Vec::with_capacity(5 + fragment.fragment_size as usize);
    input.push(fragment.fragment_id);
    input.push(fragment.total_fragments);
    input.push(fragment.threshold);
    input.extend_from_slice(&fragment.fragment_size.to_be_bytes());
    input.extend_from_slice(&fragment.data[..fragment.fragment_size as usize]);
    input
}

/// Computes the checksum for a fragment whose data/header fields are final.
pub fn compute_checksum(fragment: &Fragment) -> [u8; CHECKSUM_LEN] {
    content_hash(&checksum_input(fragment))
}

/// Verifies a fragment's checksum, recomputing over its header and data.
pub fn verify_checksum(fragment: &Fragment) -> Result<()> {
    let expected = compute_checksum(fragment);
    if digests_equal(&expected, &fragment.checksum) {
        Ok(())
    } else {
        Err(RkeError::FragmentCorrupt(format!(
            "checksum mismatch for fragment {}",
            fragment.fragment_id
        )))
    }
}

/// Splits `key_bytes` into `meta.total_fragments` fragments using the
/// additive all-shares XOR construction of spec.md §4.D.
pub fn split(key_bytes: &[u8], meta: &KeyMetadata) -> Result<Vec<Fragment>> {
    let n = meta.total_fragments;
    let t = meta.threshold;
    if t < 2 || t > n {
        return Err(RkeError::KeySplitting(format!(
            "threshold {} must be in [2, {}]",
            t, n
        )));
    }
    if key_bytes.is_empty() || key_bytes.len() > MAX_FRAGMENT_DATA {
        return Err(RkeError::KeySplitting(format!(
            "key length {} must be in [1, {}]",
            key_bytes.len(),
            MAX_FRAGMENT_DATA
        )));
    }
    let l = key_bytes.len();

    let mut fragments: Vec<Fragment> = (0..n)
        .map(|_| Fragment::zeroed())
        .collect();

    fragments[0].data[..l].copy_from_slice(key_bytes);

    for id in 2..=n {
        let idx = (id - 1) as usize;
        let random = random_bytes(l)?;
        fragments[idx].data[..l].copy_from_slice(&random);
        for i in 0..l {
            fragments[0].data[i] ^= random[i];
        }
    }

    for (i, fragment) in fragments.iter_mut().enumerate() {
        fragment.fragment_id = (i + 1) as u8;
        fragment.total_fragments = n;
        fragment.threshold = t;
        fragment.fragment_size = l as u16;
        fragment.checksum = compute_checksum(fragment);
    }

    Ok(fragments)
}

/// Reconstructs the original key from all fragments currently present in
/// `store` for `meta.key_id`. Requires every fragment (see module docs),
/// not merely `meta.threshold` of them.
pub fn reconstruct(store: &dyn FragmentStore, meta: &KeyMetadata) -> Result<Vec<u8>> {
    let mut present = Vec::new();
    for id in 1..=meta.total_fragments {
        if store.fragment_exists(&meta.key_id, id) {
            present.push(store.load_fragment(&meta.key_id, id)?);
        }
    }

    if present.len() < meta.threshold as usize {
        return Err(RkeError::InsufficientFragments {
            have: present.len(),
            need: meta.threshold as usize,
        });
    }
    if present.len() < meta.total_fragments as usize {
        return Err(RkeError::InsufficientFragments {
            have: present.len(),
            need: meta.total_fragments as usize,
        });
    }

    for fragment in &present {
        verify_checksum(fragment)?;
    }

    let l = present[0].fragment_size as usize;
    let mut key = vec![0u8; l];
    for fragment in &present {
        for i in 0..l {
            key[i] ^= fragment.data[i];
        }
    }
    Ok(key)
}
