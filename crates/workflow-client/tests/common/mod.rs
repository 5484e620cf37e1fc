/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for workflow-client tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use wiremock::MockServer;
use workflow_client::{
    ClientConfig, Credential, KeyValueStore, MemoryStore, SessionContext, WorkflowClient,
};

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client against the mock server, sharing `backend` for persistence
pub fn client_for(server: &MockServer, backend: Arc<dyn KeyValueStore>) -> WorkflowClient {
    let context = Arc::new(SessionContext::new(backend));
    WorkflowClient::with_context(ClientConfig::with_base_url(server.uri()), context)
        .expect("client init")
}

/// Client seeded with `credential` in a fresh in-memory store
pub fn seeded_client(server: &MockServer, credential: Credential) -> WorkflowClient {
    let client = client_for(server, Arc::new(MemoryStore::new()));
    client.context().store_credential(credential);
    client
}

pub fn credential(access_in: Duration, refresh_in: Duration) -> Credential {
    Credential {
        access_token: "old-token".to_string(),
        access_expires_at: Some(Utc::now() + access_in),
        refresh_token: Some("refresh-token".to_string()),
        refresh_expires_at: Some(Utc::now() + refresh_in),
    }
}

/// Credential whose access token expired but can still be refreshed
pub fn expired_credential() -> Credential {
    credential(Duration::minutes(-5), Duration::days(1))
}

pub fn valid_credential() -> Credential {
    credential(Duration::hours(1), Duration::days(1))
}

/// Body of a successful login or refresh
pub fn token_body(access_token: &str) -> serde_json::Value {
    let expires = Utc::now() + Duration::hours(2);
    serde_json::json!({
        "tokenType": "Bearer",
        "accessToken": access_token,
        "refreshToken": format!("refresh-for-{access_token}"),
        "expiresAt": expires.to_rfc3339(),
        "refreshExpiresAt": (expires + Duration::days(1)).to_rfc3339(),
        "username": "alice",
        "roles": ["ROLE_USER"],
    })
}

/// HTTP `Date` header value for `time`
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("workflow-client-{}", uuid::Uuid::new_v4()))
}
