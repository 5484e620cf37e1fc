/*
[INPUT]:  Login responses, server clock headers, persistence backend
[OUTPUT]: Credential lifecycle, single-flight refresh, session projection
[POS]:    Auth layer - token lifecycle for the workflow backend
[UPDATE]: When token storage, refresh, or session rules change
*/

pub mod clock;
pub mod context;
pub mod refresh;
pub mod session;
pub mod storage;
pub mod store;

pub use clock::ClockOffset;
pub use context::{AuthEvent, LogoutReason, SessionContext};
pub use refresh::{RefreshCoordinator, RefreshFailure, TokenGrant, TokenRefresher};
pub use session::{Session, SessionState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::{Credential, CredentialStore, Profile, TokenKind};
