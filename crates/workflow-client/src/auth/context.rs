/*
[INPUT]:  Persistence backend chosen at startup
[OUTPUT]: Shared clock, credential store, and auth event broadcast
[POS]:    Auth layer - explicit session context injected into collaborators
[UPDATE]: When adding process-wide auth state or new auth events
*/

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{info, warn};

use super::clock::ClockOffset;
use super::storage::{KeyValueStore, MemoryStore};
use super::store::{Credential, CredentialStore};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Why the session was ended without the user asking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    TokenRefreshFailed,
}

impl LogoutReason {
    pub fn code(&self) -> &'static str {
        match self {
            LogoutReason::TokenRefreshFailed => "token_refresh_failed",
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Signals broadcast to whoever drives the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    Authenticated { username: String },
    LoggedOut,
    ForcedLogout { reason: LogoutReason },
}

/// Process-wide authentication state with an explicit lifecycle.
///
/// Owns the clock offset, the credential store and the event channel.
/// `ForcedLogout` fires at most once per authenticated session.
#[derive(Debug)]
pub struct SessionContext {
    clock: ClockOffset,
    credentials: CredentialStore,
    events: broadcast::Sender<AuthEvent>,
    forced_logout_armed: AtomicBool,
}

impl SessionContext {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        let clock = ClockOffset::new();
        let credentials = CredentialStore::new(backend, clock.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let armed = credentials.credential().is_some();

        Self {
            clock,
            credentials,
            events,
            forced_logout_armed: AtomicBool::new(armed),
        }
    }

    /// Context backed by a process-local store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn clock(&self) -> &ClockOffset {
        &self.clock
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Store a credential and start a new forced-logout window
    pub fn store_credential(&self, credential: Credential) {
        if let Err(err) = self.credentials.save(credential) {
            warn!(error = %err, "failed to persist credential");
        }
        self.forced_logout_armed.store(true, Ordering::SeqCst);
    }

    /// Drop the credential without signalling anyone
    pub fn clear_credentials(&self) {
        if let Err(err) = self.credentials.clear() {
            warn!(error = %err, "failed to clear persisted credential");
        }
    }

    /// User-initiated end of session; no forced-logout will follow
    pub fn end_session(&self) {
        self.forced_logout_armed.store(false, Ordering::SeqCst);
        self.clear_credentials();
    }

    /// Clear credentials and broadcast `ForcedLogout` once per session.
    ///
    /// Returns whether the signal was sent by this call.
    pub fn force_logout(&self, reason: LogoutReason) -> bool {
        self.clear_credentials();
        if self.forced_logout_armed.swap(false, Ordering::SeqCst) {
            info!(reason = %reason, "forcing logout");
            self.emit(AuthEvent::ForcedLogout { reason });
            true
        } else {
            false
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::in_memory()
    }
}
