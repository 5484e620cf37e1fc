/*
[INPUT]:  Token pairs from login/refresh, persisted key-value state
[OUTPUT]: Current credential, profile, and skew-adjusted expiry status
[POS]:    Auth layer - single source of truth for the token pair
[UPDATE]: When storage keys, expiry policy, or credential shape change
*/

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http::Result;
use crate::types::LoginResponse;

use super::clock::ClockOffset;
use super::storage::KeyValueStore;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const TOKEN_EXPIRES_AT_KEY: &str = "tokenExpiresAt";
pub const REFRESH_TOKEN_EXPIRES_AT_KEY: &str = "refreshTokenExpiresAt";
pub const PROFILE_KEY: &str = "workflow-auth";

const ALL_KEYS: [&str; 5] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    TOKEN_EXPIRES_AT_KEY,
    REFRESH_TOKEN_EXPIRES_AT_KEY,
    PROFILE_KEY,
];

/// Tokens are treated as expired this long before their literal expiry
pub const EXPIRY_BUFFER_MS: i64 = 60_000;

/// Which half of the token pair to check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Access/refresh token pair with absolute expiries.
///
/// A missing expiry means "unknown" and always counts as expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Build the credential carried by a login or refresh response.
    ///
    /// When the response omits a refresh token, the previous refresh
    /// token and its expiry are kept.
    pub fn from_response(response: &LoginResponse, previous: Option<&Credential>) -> Self {
        let (refresh_token, refresh_expires_at) = match &response.refresh_token {
            Some(token) => (
                Some(token.clone()),
                response.refresh_expires_at.as_deref().and_then(parse_expiry),
            ),
            None => previous
                .map(|prev| (prev.refresh_token.clone(), prev.refresh_expires_at))
                .unwrap_or((None, None)),
        };

        Self {
            access_token: response.access_token.clone(),
            access_expires_at: response.expires_at.as_deref().and_then(parse_expiry),
            refresh_token,
            refresh_expires_at,
        }
    }
}

/// Cached profile fields stored next to the credential
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Durable holder of the token pair.
///
/// The in-memory copy is authoritative for this process; the backend is
/// written through on every change.
#[derive(Debug)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    clock: ClockOffset,
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    /// Create a store and load whatever the backend already holds
    pub fn new(backend: Arc<dyn KeyValueStore>, clock: ClockOffset) -> Self {
        let store = Self {
            backend,
            clock,
            current: RwLock::new(None),
        };
        store.load();
        store
    }

    /// Re-read the persisted credential. Absent or corrupt data yields `None`.
    pub fn load(&self) -> Option<Credential> {
        let loaded = self.read_persisted();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = loaded.clone();
        loaded
    }

    /// Current credential, if any
    pub fn credential(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.credential().map(|credential| credential.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.credential()
            .and_then(|credential| credential.refresh_token)
    }

    /// Overwrite every credential field.
    ///
    /// The in-memory view is updated even when persisting fails.
    pub fn save(&self, credential: Credential) -> Result<()> {
        let entries = [
            (ACCESS_TOKEN_KEY, credential.access_token.clone()),
            (TOKEN_EXPIRES_AT_KEY, format_expiry(credential.access_expires_at)),
            (
                REFRESH_TOKEN_KEY,
                credential.refresh_token.clone().unwrap_or_default(),
            ),
            (
                REFRESH_TOKEN_EXPIRES_AT_KEY,
                format_expiry(credential.refresh_expires_at),
            ),
        ];

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        self.backend.set_all(&entries)
    }

    /// Remove every persisted field, profile included
    pub fn clear(&self) -> Result<()> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("credentials cleared");
        self.backend.remove_all(&ALL_KEYS)
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        let blob = serde_json::to_string(profile)?;
        self.backend.set_all(&[(PROFILE_KEY, blob)])
    }

    /// Cached profile. `Err` means the blob exists but is corrupt.
    pub fn load_profile(&self) -> Result<Option<Profile>> {
        match self.backend.get(PROFILE_KEY)? {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    /// True when `adjusted_now >= expiry - 60s`, or when the expiry is unknown
    pub fn is_expired(&self, kind: TokenKind) -> bool {
        let expires_at = self.credential().and_then(|credential| match kind {
            TokenKind::Access => credential.access_expires_at,
            TokenKind::Refresh => credential.refresh_expires_at,
        });
        is_expired_at(expires_at, self.clock.adjusted_now())
    }

    pub fn clock(&self) -> &ClockOffset {
        &self.clock
    }

    fn read_persisted(&self) -> Option<Credential> {
        let read = |key: &str| match self.backend.get(key) {
            Ok(value) => value.filter(|value| !value.is_empty()),
            Err(err) => {
                warn!(key, error = %err, "failed to read persisted credential field");
                None
            }
        };

        let access_token = read(ACCESS_TOKEN_KEY)?;
        Some(Credential {
            access_token,
            access_expires_at: read(TOKEN_EXPIRES_AT_KEY).and_then(|raw| parse_expiry(&raw)),
            refresh_token: read(REFRESH_TOKEN_KEY),
            refresh_expires_at: read(REFRESH_TOKEN_EXPIRES_AT_KEY)
                .and_then(|raw| parse_expiry(&raw)),
        })
    }
}

/// Expiry check against an already adjusted clock
pub fn is_expired_at(expires_at: Option<DateTime<Utc>>, adjusted_now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expires_at) => {
            adjusted_now >= expires_at - Duration::milliseconds(EXPIRY_BUFFER_MS)
        }
        None => true,
    }
}

/// Parse an RFC 3339 expiry; anything else is unknown
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn format_expiry(expires_at: Option<DateTime<Utc>>) -> String {
    expires_at
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}
