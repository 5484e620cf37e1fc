/*
[INPUT]:  Username/password, refresh token, current credential
[OUTPUT]: Login responses and best-effort backend logout
[POS]:    HTTP layer - authentication endpoints (no pre-flight refresh)
[UPDATE]: When auth endpoints or logout policy change
*/

use tracing::debug;

use crate::auth::store::TokenKind;
use crate::http::{Result, WorkflowClient};
use crate::types::{LoginRequest, LoginResponse, RefreshTokenRequest};

use super::pipeline::{ApiRequest, LOGIN_ENDPOINT, LOGOUT_ENDPOINT};

impl WorkflowClient {
    /// Exchange username and password for a token pair
    ///
    /// POST /auth/login
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let request = ApiRequest::post(LOGIN_ENDPOINT).with_json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        self.send_json(request).await
    }

    /// Best-effort backend logout, then local credentials are dropped.
    ///
    /// POST /auth/logout
    ///
    /// The backend is only called while a valid, non-expired access token
    /// exists. Backend errors are ignored.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let store = self.context.credentials();
        match store.access_token() {
            Some(token) if !store.is_expired(TokenKind::Access) => {
                let request = match refresh_token {
                    Some(refresh_token) => ApiRequest::post(LOGOUT_ENDPOINT)
                        .with_json(&RefreshTokenRequest {
                            refresh_token: refresh_token.to_string(),
                        }),
                    None => Ok(ApiRequest::post(LOGOUT_ENDPOINT)),
                };
                match request {
                    Ok(request) => {
                        if let Err(err) = self.send_unit(request.with_bearer(token)).await {
                            debug!(error = %err, "ignoring logout failure");
                        }
                    }
                    Err(err) => debug!(error = %err, "could not build logout request"),
                }
            }
            _ => debug!("no valid access token, skipping backend logout"),
        }

        self.context.end_session();
    }
}
