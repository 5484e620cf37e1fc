/*
[INPUT]:  Workflow client, login form input, auth event broadcast
[OUTPUT]: Reactive read-only session projection (authenticated, username, roles)
[POS]:    Auth layer - orchestrates login/logout and reacts to forced logout
[UPDATE]: When session fields, login error messages, or logout flow change
*/

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::StatusCode;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::http::{Result, WorkflowClient, WorkflowError};

use super::context::AuthEvent;
use super::store::{Credential, Profile};

const ADMIN_ROLE: &str = "ROLE_ADMIN";

/// What the UI is allowed to see of the credential
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub username: String,
    pub roles: Vec<String>,
}

impl Session {
    fn from_profile(profile: Profile) -> Self {
        Self {
            authenticated: true,
            username: profile.username,
            roles: profile.roles,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role == ADMIN_ROLE)
    }
}

/// Session projection over the credential store
#[derive(Debug)]
pub struct SessionState {
    client: Arc<WorkflowClient>,
    projection: Arc<watch::Sender<Session>>,
    last_error: Mutex<Option<String>>,
}

impl SessionState {
    pub fn new(client: Arc<WorkflowClient>) -> Self {
        let (projection, _) = watch::channel(Session::default());
        Self {
            client,
            projection: Arc::new(projection),
            last_error: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &Arc<WorkflowClient> {
        &self.client
    }

    /// Rebuild the projection from persisted state.
    ///
    /// Authenticated only when both a token and a profile are stored; a
    /// corrupt profile blob also ends the session.
    pub fn initialize(&self) -> Session {
        let store = self.client.credentials();
        let session = match store.load() {
            None => Session::default(),
            Some(_) => match store.load_profile() {
                Ok(Some(profile)) => Session::from_profile(profile),
                Ok(None) => {
                    debug!("token stored without a profile, staying logged out");
                    Session::default()
                }
                Err(err) => {
                    warn!(error = %err, "stored session profile is corrupt, clearing");
                    self.client.context().end_session();
                    Session::default()
                }
            },
        };

        self.publish(session.clone());
        session
    }

    /// Clear the projection whenever a forced logout is broadcast.
    ///
    /// The task ends when the session context is dropped.
    pub fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let mut events = self.client.subscribe();
        let projection = self.projection.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::ForcedLogout { reason }) => {
                        info!(reason = %reason, "session ended by forced logout");
                        projection.send_replace(Session::default());
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "auth event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn session(&self) -> Session {
        self.projection.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.projection.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.projection.borrow().authenticated
    }

    pub fn username(&self) -> String {
        self.projection.borrow().username.clone()
    }

    pub fn is_admin(&self) -> bool {
        self.projection.borrow().is_admin()
    }

    /// Message describing the last failed login, if any
    pub fn last_error(&self) -> Option<String> {
        self.lock_error().clone()
    }

    /// Log in and persist the credential plus profile
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        *self.lock_error() = None;

        let response = match self.client.login(username, password).await {
            Ok(response) => response,
            Err(err) => {
                *self.lock_error() = Some(login_failure_message(&err));
                self.client.context().end_session();
                self.publish(Session::default());
                return Err(err);
            }
        };

        let context = self.client.context();
        context.store_credential(Credential::from_response(&response, None));

        let profile = Profile {
            username: response.username,
            roles: response.roles,
        };
        if let Err(err) = context.credentials().save_profile(&profile) {
            warn!(error = %err, "failed to persist session profile");
        }

        let session = Session::from_profile(profile);
        self.publish(session.clone());
        info!(username = %session.username, "logged in");
        context.emit(AuthEvent::Authenticated {
            username: session.username.clone(),
        });
        Ok(session)
    }

    /// User-initiated logout; always ends the local session
    pub async fn logout(&self) {
        let refresh_token = self.client.credentials().refresh_token();
        self.client.logout(refresh_token.as_deref()).await;

        self.publish(Session::default());
        info!("logged out");
        self.client.context().emit(AuthEvent::LoggedOut);
    }

    fn publish(&self, session: Session) {
        self.projection.send_replace(session);
    }

    fn lock_error(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Human-readable reason for a failed login
pub fn login_failure_message(err: &WorkflowError) -> String {
    match err.status() {
        Some(StatusCode::FORBIDDEN) => {
            "Access forbidden. Please check backend CORS/CSRF configuration.".to_string()
        }
        Some(status) => format!(
            "Login failed: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )
        .trim_end()
        .to_string(),
        None => err.to_string(),
    }
}
