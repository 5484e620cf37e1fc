/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public workflow client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{
    AuthEvent,
    ClockOffset,
    Credential,
    CredentialStore,
    FileStore,
    KeyValueStore,
    LogoutReason,
    MemoryStore,
    RefreshCoordinator,
    RefreshFailure,
    Session,
    SessionContext,
    SessionState,
};

// Re-export commonly used types from http
pub use http::{
    ApiRequest,
    ClientConfig,
    RequestBody,
    Result,
    WorkflowClient,
    WorkflowError,
};

// Re-export all types
pub use types::*;
