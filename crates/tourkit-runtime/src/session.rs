#![forbid(unsafe_code)]

//! Session identity persistence.
//!
//! A session id stays stable across reloads so analytics event ids
//! (`{session_id}-{seq}`) keep deduplicating at the remote boundary. A
//! persisted identity is reused when it belongs to the same user;
//! anything else (missing, corrupt, another user) mints a fresh one.

use tourkit_analytics::SessionIdentity;
use tourkit_core::storage::{KEY_SESSION, StorageBackend, load_json, store_json};
use tourkit_journey::TimestampMs;

/// Load the persisted session for this user, or create and persist one.
///
/// The minted id embeds the user id and the creation timestamp, which is
/// unique enough for one active session per user at a time.
#[must_use]
pub fn load_or_create_session(
    storage: &dyn StorageBackend,
    user_id: &str,
    organization_id: &str,
    at: TimestampMs,
) -> SessionIdentity {
    let stored: SessionIdentity = load_json(storage, KEY_SESSION);
    if !stored.session_id.is_empty() && stored.user_id == user_id {
        tracing::debug!(session = %stored.session_id, "resuming persisted session");
        return stored;
    }

    let session = SessionIdentity {
        session_id: format!("sess-{user_id}-{at}"),
        user_id: user_id.to_string(),
        organization_id: organization_id.to_string(),
    };
    if let Err(e) = store_json(storage, KEY_SESSION, &session) {
        tracing::warn!(error = %e, "failed to persist session identity");
    }
    tracing::debug!(session = %session.session_id, "created new session");
    session
}
