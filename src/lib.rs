//! RAIDA Key Exchange (RKE) core.
//!
//! Provides key splitting and fragment custody, the legacy
//! encryption-coin commit protocol, and the command handlers peers speak
//! to exchange and reassemble split keys.
//!
//! # Architecture
//!
//! - **types**: wire/on-disk data structures (fixed layout, frozen field
//!   order)
//! - **codec**: fixed-width byte (de)serialization for those structures
//! - **crypto**: hashing, the legacy stream cipher, and secure randomness
//! - **splitter**: the additive all-shares key-splitting construction
//! - **store**: filesystem-backed fragment/metadata persistence
//! - **enccoin**: encryption-coin file loading and peer-secret extraction
//! - **session**: per-exchange session identity
//! - **authpage**: the external authenticity-page store seam
//! - **config**: process-wide configuration
//! - **dispatch**: per-command wire handlers
//! - **errors**: typed error handling (no panics on the command path)
//!
//! # Usage
//!
//! ```rust
//! use rke_core::types::{ConnCtx, KeyMetadata};
//! use rke_core::store::FsFragmentStore;
//! use rke_core::dispatch::handle_rke_generate;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = FsFragmentStore::new(dir.path());
//! let mut body = vec![0u8; 21];
//! body[17] = 5; // total_fragments
//! body[18] = 3; // threshold
//! let mut ctx = ConnCtx::new(body, [0u8; 16]);
//! handle_rke_generate(&mut ctx, &store);
//! assert_eq!(ctx.command_status, 0);
//! ```

pub mod authpage;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod enccoin;
pub mod errors;
pub mod session;
pub mod splitter;
pub mod store;
pub mod types;

pub use errors::{Result, RkeError};
pub use types::{ConnCtx, Fragment, KeyMetadata, KeyType};

/// Library version (matches Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
