//! Per-exchange session descriptor (spec.md §4.G).
//!
//! Sessions are stateless between requests; they exist only to bind a
//! sender/receiver pair and a timeout for the duration of one exchange,
//! and are scrubbed on cleanup.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::random_array;
use crate::errors::Result;
use crate::types::{Session, SessionState};

/// Default session lifetime, in seconds.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 3600;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Creates a new session bound to `sender`/`receiver`, with a random
/// session id and a default one-hour timeout.
pub fn init_session(sender: [u8; 16], receiver: [u8; 16]) -> Result<Session> {
    let session_id = random_array::<16>()?;
    Ok(Session {
        session_id,
        sender_id: sender,
        receiver_id: receiver,
        state: SessionState::Init,
        timeout: now_secs() + DEFAULT_SESSION_TIMEOUT_SECS,
    })
}

/// Overwrites every byte of `session` with zero before it is dropped.
pub fn cleanup_session(session: &mut Session) {
    session.session_id = [0u8; 16];
    session.sender_id = [0u8; 16];
    session.receiver_id = [0u8; 16];
    session.state = SessionState::Expired;
    session.timeout = 0;
}
