/*
[INPUT]:  HTTP configuration (base URL, timeouts) and a session context
[OUTPUT]: Configured client whose every call runs through the token pipeline
[POS]:    HTTP layer - core client implementation and raw transport
[UPDATE]: When adding connection options or changing client behavior
*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use tokio::sync::broadcast;

use crate::auth::clock::{ClockOffset, server_time_from_headers};
use crate::auth::context::{AuthEvent, SessionContext};
use crate::auth::refresh::{RefreshCoordinator, TokenGrant, TokenRefresher};
use crate::auth::store::CredentialStore;
use crate::types::{LoginResponse, RefreshTokenRequest};

use super::error::{Result, WorkflowError};
use super::pipeline::{ApiRequest, REFRESH_ENDPOINT, RequestBody};

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// Raw request sender. Observes the server clock on every response and maps
/// non-success statuses to [`WorkflowError::Api`]; no token handling.
#[derive(Debug)]
pub(crate) struct HttpTransport {
    http_client: Client,
    base_url: Url,
    clock: ClockOffset,
}

impl HttpTransport {
    fn new(config: &ClientConfig, clock: ClockOffset) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: normalize_base_url(&config.base_url)?,
            clock,
        })
    }

    /// Build full URL for an endpoint below the base path
    fn url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }

    pub(crate) async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<Response> {
        let url = self.url(request.endpoint())?;
        let mut builder = self.http_client.request(request.method().clone(), url);

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart {
                field,
                file_name,
                bytes,
            } => {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                builder.multipart(Form::new().part(field.clone(), part))
            }
        };

        let response = builder.send().await?;
        self.clock.observe_headers(response.headers());

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(WorkflowError::api_error(status, message))
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTransport {
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenGrant> {
        let request = ApiRequest::post(REFRESH_ENDPOINT).with_json(&RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        })?;
        let response = self.send(&request, None).await?;
        let server_time = server_time_from_headers(response.headers());
        let bytes = response.bytes().await?;
        let response: LoginResponse = serde_json::from_slice(&bytes).map_err(|err| {
            WorkflowError::InvalidResponse(format!("refresh response body: {err}"))
        })?;
        Ok(TokenGrant {
            response,
            server_time,
        })
    }
}

/// Main HTTP client for the workflow backend
#[derive(Debug)]
pub struct WorkflowClient {
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) context: Arc<SessionContext>,
    pub(crate) coordinator: RefreshCoordinator,
}

impl WorkflowClient {
    /// Create a new client with default configuration and in-memory credentials
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration and in-memory credentials
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_context(config, Arc::new(SessionContext::in_memory()))
    }

    /// Create a client sharing an existing session context
    pub fn with_context(config: ClientConfig, context: Arc<SessionContext>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config, context.clock().clone())?);
        let coordinator = RefreshCoordinator::new(context.clone(), transport.clone());
        Ok(Self {
            transport,
            context,
            coordinator,
        })
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.context.credentials()
    }

    pub fn clock(&self) -> &ClockOffset {
        self.context.clock()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Receive authentication events (forced logout, login, logout)
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.context.subscribe()
    }
}

/// Base URLs are joined with relative endpoints, so they need a trailing slash
fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::Config("base URL must not be empty".to_string()));
    }
    let mut url = Url::parse(trimmed)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let transport =
            HttpTransport::new(&ClientConfig::with_base_url("http://host:8080/api"), ClockOffset::new())
                .unwrap();
        assert_eq!(
            transport.url("/auth/login").unwrap().as_str(),
            "http://host:8080/api/auth/login"
        );
        assert_eq!(
            transport.url("tasks/my").unwrap().as_str(),
            "http://host:8080/api/tasks/my"
        );
    }

    #[test]
    fn test_base_url_root() {
        let url = normalize_base_url("http://127.0.0.1:9000").unwrap();
        assert_eq!(url.join("auth/refresh").unwrap().as_str(), "http://127.0.0.1:9000/auth/refresh");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(matches!(
            normalize_base_url("  "),
            Err(WorkflowError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_undecodable_refresh_body_is_invalid_response() {
        use crate::auth::refresh::RefreshFailure;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(&ClientConfig::with_base_url(server.uri()), ClockOffset::new())
                .unwrap();
        let err = transport.refresh_tokens("refresh-1").await.unwrap_err();

        assert!(matches!(err, WorkflowError::InvalidResponse(_)));
        assert!(matches!(
            RefreshFailure::from(&err),
            RefreshFailure::Transport(_)
        ));
    }

    #[test]
    fn test_client_starts_unauthenticated() {
        let client = WorkflowClient::new().unwrap();
        assert!(client.credentials().access_token().is_none());
        assert!(!client.coordinator().is_refreshing());
        assert_eq!(client.clock().offset_ms(), 0);
    }
}
