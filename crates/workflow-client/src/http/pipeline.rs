/*
[INPUT]:  Outbound API requests and the current credential
[OUTPUT]: Responses, after token injection and one-shot 401 recovery
[POS]:    HTTP layer - request pipeline wrapping every outbound call
[UPDATE]: When changing pre-flight, retry, or failure escalation rules
*/

use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::auth::context::LogoutReason;
use crate::auth::refresh::{RefreshFailure, RefreshOutcome};
use crate::auth::store::TokenKind;

use super::client::WorkflowClient;
use super::error::{Result, WorkflowError};

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";

const AUTH_PREFIX: &str = "/auth/";

/// Request payload, kept owned so the request can be resubmitted
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart {
        field: String,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// Description of one API call.
///
/// `retried` is set once the request has been resubmitted after a 401; a
/// retried request is never recovered again.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    endpoint: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    bearer: Option<String>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            bearer: None,
            retried: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_multipart(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.body = RequestBody::Multipart {
            field: field.into(),
            file_name: file_name.into(),
            bytes,
        };
        self
    }

    /// Attach a token explicitly; used for auth endpoints, which skip pre-flight
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Mark the request as already resubmitted once
    pub fn mark_retried(mut self) -> Self {
        self.retried = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Login, refresh and logout
    pub fn is_auth_endpoint(&self) -> bool {
        self.endpoint.starts_with(AUTH_PREFIX)
    }

    pub fn is_logout_endpoint(&self) -> bool {
        self.endpoint.starts_with(LOGOUT_ENDPOINT)
    }
}

/// What pre-flight decided for a request
#[derive(Debug, Default)]
struct Preflight {
    bearer: Option<String>,
    refresh_failed: bool,
}

impl WorkflowClient {
    /// Send a request through the pipeline
    pub async fn execute(&self, request: ApiRequest) -> Result<Response> {
        let preflight = self.preflight(&request).await;
        let result = self
            .transport
            .send(&request, preflight.bearer.as_deref())
            .await;
        self.postflight(request, preflight, result).await
    }

    /// Send a request and decode its JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send a request whose response body is irrelevant
    pub async fn send_unit(&self, request: ApiRequest) -> Result<()> {
        self.execute(request).await.map(|_| ())
    }

    async fn preflight(&self, request: &ApiRequest) -> Preflight {
        if request.is_auth_endpoint() {
            return Preflight {
                bearer: request.bearer.clone(),
                refresh_failed: false,
            };
        }

        let store = self.context.credentials();
        let Some(token) = store.access_token() else {
            return Preflight::default();
        };
        if !store.is_expired(TokenKind::Access) {
            return Preflight {
                bearer: Some(token),
                refresh_failed: false,
            };
        }

        debug!(endpoint = request.endpoint(), "access token expired, refreshing first");
        match self.refresh_settled(Some(&token)).await {
            Ok(fresh) => Preflight {
                bearer: Some(fresh),
                refresh_failed: false,
            },
            Err(failure) => {
                debug!(
                    endpoint = request.endpoint(),
                    reason = %failure,
                    "refresh failed, sending without credentials"
                );
                Preflight {
                    bearer: None,
                    refresh_failed: true,
                }
            }
        }
    }

    async fn postflight(
        &self,
        request: ApiRequest,
        preflight: Preflight,
        result: Result<Response>,
    ) -> Result<Response> {
        let err = match result {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if request.is_logout_endpoint() {
            debug!(error = %err, "logout request failed");
            return Err(err);
        }

        if !err.is_unauthorized() || request.is_retried() {
            log_failure(&request, &err);
            return Err(err);
        }

        if request.is_auth_endpoint() {
            self.context.clear_credentials();
            return Err(err);
        }

        // Pre-flight already spent the refresh; a second attempt would only
        // repeat the same request unauthenticated.
        if preflight.refresh_failed {
            self.context.force_logout(LogoutReason::TokenRefreshFailed);
            return Err(err);
        }

        let retry = request.mark_retried();
        match self.refresh_settled(preflight.bearer.as_deref()).await {
            Ok(token) => {
                debug!(endpoint = retry.endpoint(), "retrying with refreshed token");
                let result = self.transport.send(&retry, Some(&token)).await;
                if let Err(retry_err) = &result {
                    log_failure(&retry, retry_err);
                }
                result
            }
            Err(failure) => {
                warn!(
                    endpoint = retry.endpoint(),
                    reason = %failure,
                    "session could not be recovered"
                );
                self.context.force_logout(LogoutReason::TokenRefreshFailed);
                Err(err)
            }
        }
    }

    /// Refresh, starting over when the leading refresh was dropped before
    /// it settled. Only a decided outcome is returned.
    async fn refresh_settled(&self, stale: Option<&str>) -> RefreshOutcome {
        loop {
            match self.coordinator.refresh_stale(stale).await {
                Err(RefreshFailure::Abandoned) => {
                    debug!("refresh leader went away, refreshing again");
                }
                outcome => return outcome,
            }
        }
    }
}

fn log_failure(request: &ApiRequest, err: &WorkflowError) {
    match err {
        WorkflowError::Api { code, message } => warn!(
            method = %request.method(),
            endpoint = request.endpoint(),
            status = code,
            message = message.as_str(),
            "API error"
        ),
        WorkflowError::Http(source) => error!(
            method = %request.method(),
            endpoint = request.endpoint(),
            error = %source,
            "network error"
        ),
        other => error!(
            method = %request.method(),
            endpoint = request.endpoint(),
            error = %other,
            "request failed"
        ),
    }
}
