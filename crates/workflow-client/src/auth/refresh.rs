/*
[INPUT]:  Refresh requests from concurrent callers, stored refresh token
[OUTPUT]: One shared refresh outcome per in-flight refresh
[POS]:    Auth layer - single-flight token refresh with waiter fan-out
[UPDATE]: When refresh policy, failure handling, or fan-out semantics change
*/

use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::http::{Result, WorkflowError};
use crate::types::LoginResponse;

use super::context::{LogoutReason, SessionContext};
use super::store::{Credential, TokenKind};

/// Why a refresh did not produce a new access token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh token has expired")]
    RefreshTokenExpired,

    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },

    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("refresh abandoned before completing")]
    Abandoned,
}

impl From<&WorkflowError> for RefreshFailure {
    fn from(err: &WorkflowError) -> Self {
        match err.status() {
            Some(status) => RefreshFailure::Rejected {
                status: status.as_u16(),
            },
            None => RefreshFailure::Transport(err.to_string()),
        }
    }
}

impl From<RefreshFailure> for WorkflowError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::RefreshTokenExpired => WorkflowError::TokenExpired,
            other => WorkflowError::Authentication {
                message: other.to_string(),
            },
        }
    }
}

/// New access token, or the reason there is none
pub type RefreshOutcome = std::result::Result<String, RefreshFailure>;

/// Successful refresh response plus the server time it was sent at
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub response: LoginResponse,
    pub server_time: Option<DateTime<Utc>>,
}

/// Performs the refresh network call
#[async_trait]
pub trait TokenRefresher: Debug + Send + Sync {
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenGrant>;
}

type Waiters = Vec<oneshot::Sender<RefreshOutcome>>;

/// Guarantees at most one refresh call in flight.
///
/// `in_flight` is `Some` while a refresh runs and holds the callers waiting
/// on it, in registration order. Entry check-and-set and the final
/// drain-and-reset both happen under the same lock.
#[derive(Debug)]
pub struct RefreshCoordinator {
    context: Arc<SessionContext>,
    refresher: Arc<dyn TokenRefresher>,
    in_flight: Mutex<Option<Waiters>>,
}

impl RefreshCoordinator {
    pub fn new(context: Arc<SessionContext>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            context,
            refresher,
            in_flight: Mutex::new(None),
        }
    }

    /// Refresh the access token, joining an in-flight refresh if there is one
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_stale(None).await
    }

    /// Like [`refresh`](Self::refresh), but when the caller's `stale` token has
    /// already been replaced by a valid one, that token is returned without a
    /// network call.
    pub async fn refresh_stale(&self, stale: Option<&str>) -> RefreshOutcome {
        let waiter = {
            let mut in_flight = self.lock();
            match in_flight.as_mut() {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    if let Some(token) = self.already_replaced(stale) {
                        return Ok(token);
                    }
                    *in_flight = Some(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or(Err(RefreshFailure::Abandoned));
        }

        let mut leader = LeaderGuard {
            coordinator: self,
            settled: false,
        };
        let outcome = self.run_refresh().await;
        leader.settle(&outcome);
        outcome
    }

    /// Whether a refresh is currently running
    pub fn is_refreshing(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Waiters>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn already_replaced(&self, stale: Option<&str>) -> Option<String> {
        let stale = stale?;
        let store = self.context.credentials();
        let current = store.access_token()?;
        (current != stale && !store.is_expired(TokenKind::Access)).then_some(current)
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let store = self.context.credentials();

        let Some(refresh_token) = store.refresh_token() else {
            return self.fail(RefreshFailure::MissingRefreshToken);
        };
        if store.is_expired(TokenKind::Refresh) {
            warn!("refresh token has expired");
            return self.fail(RefreshFailure::RefreshTokenExpired);
        }

        debug!("refreshing access token");
        match self.refresher.refresh_tokens(&refresh_token).await {
            Ok(grant) => {
                if let Some(server_time) = grant.server_time {
                    self.context.clock().observe(server_time);
                }
                let previous = store.credential();
                let credential = Credential::from_response(&grant.response, previous.as_ref());
                let token = credential.access_token.clone();
                self.context.store_credential(credential);
                debug!("access token refreshed");
                Ok(token)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                self.fail(RefreshFailure::from(&err))
            }
        }
    }

    fn fail(&self, failure: RefreshFailure) -> RefreshOutcome {
        self.context.force_logout(LogoutReason::TokenRefreshFailed);
        Err(failure)
    }
}

/// Drains the waiters when the leading refresh settles or is dropped.
///
/// A dropped leader releases its waiters with `Abandoned` so the next
/// caller can start a fresh refresh.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(&mut self, outcome: &RefreshOutcome) {
        let mut in_flight = self.coordinator.lock();
        let waiters = in_flight.take().unwrap_or_default();
        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "releasing refresh waiters");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        self.settled = true;
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(&Err(RefreshFailure::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::AuthEvent;
    use chrono::Duration;
    use futures_util::future::join_all;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct MockRefresher {
        calls: AtomicUsize,
        reject_with: Option<StatusCode>,
    }

    impl MockRefresher {
        fn succeeding() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reject_with: None,
            })
        }

        fn rejecting(status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reject_with: Some(status),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for MockRefresher {
        async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenGrant> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            if let Some(status) = self.reject_with {
                return Err(WorkflowError::api_error(status, "rejected"));
            }
            assert_eq!(refresh_token, "refresh-1");
            let expires_at = (Utc::now() + Duration::hours(1)).to_rfc3339();
            Ok(TokenGrant {
                response: LoginResponse {
                    token_type: "Bearer".to_string(),
                    access_token: format!("access-{}", call + 1),
                    refresh_token: Some("refresh-1".to_string()),
                    expires_at: Some(expires_at.clone()),
                    refresh_expires_at: Some(expires_at),
                    username: "admin".to_string(),
                    roles: Vec::new(),
                },
                server_time: None,
            })
        }
    }

    fn context_with(access_in: Duration, refresh_in: Duration) -> Arc<SessionContext> {
        let context = Arc::new(SessionContext::in_memory());
        let now = Utc::now();
        context.store_credential(Credential {
            access_token: "access-1".to_string(),
            access_expires_at: Some(now + access_in),
            refresh_token: Some("refresh-1".to_string()),
            refresh_expires_at: Some(now + refresh_in),
        });
        context
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_call() {
        let context = context_with(Duration::seconds(-1), Duration::days(1));
        let refresher = MockRefresher::succeeding();
        let coordinator = RefreshCoordinator::new(context.clone(), refresher.clone());

        let outcomes = join_all((0..5).map(|_| coordinator.refresh())).await;

        assert_eq!(refresher.calls(), 1);
        for outcome in outcomes {
            assert_eq!(outcome, Ok("access-2".to_string()));
        }
        assert_eq!(
            context.credentials().access_token().as_deref(),
            Some("access-2")
        );
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_call_backend() {
        let context = context_with(Duration::seconds(-1), Duration::days(1));
        let refresher = MockRefresher::succeeding();
        let coordinator = RefreshCoordinator::new(context, refresher.clone());

        assert_eq!(coordinator.refresh().await, Ok("access-2".to_string()));
        assert_eq!(coordinator.refresh().await, Ok("access-3".to_string()));
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_token_already_replaced_skips_network() {
        let context = context_with(Duration::hours(1), Duration::days(1));
        let refresher = MockRefresher::succeeding();
        let coordinator = RefreshCoordinator::new(context, refresher.clone());

        let outcome = coordinator.refresh_stale(Some("access-0")).await;

        assert_eq!(outcome, Ok("access-1".to_string()));
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_refresh_token_fails_without_network() {
        let context = context_with(Duration::seconds(-1), Duration::seconds(-1));
        let mut events = context.subscribe();
        let refresher = MockRefresher::succeeding();
        let coordinator = RefreshCoordinator::new(context.clone(), refresher.clone());

        let outcome = coordinator.refresh().await;

        assert_eq!(outcome, Err(RefreshFailure::RefreshTokenExpired));
        assert_eq!(refresher.calls(), 0);
        assert!(context.credentials().credential().is_none());
        assert!(matches!(
            events.try_recv(),
            Ok(AuthEvent::ForcedLogout { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails() {
        let context = Arc::new(SessionContext::in_memory());
        let refresher = MockRefresher::succeeding();
        let coordinator = RefreshCoordinator::new(context, refresher.clone());

        assert_eq!(
            coordinator.refresh().await,
            Err(RefreshFailure::MissingRefreshToken)
        );
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_and_fans_out_failure() {
        let context = context_with(Duration::seconds(-1), Duration::days(1));
        let mut events = context.subscribe();
        let refresher = MockRefresher::rejecting(StatusCode::UNAUTHORIZED);
        let coordinator = RefreshCoordinator::new(context.clone(), refresher.clone());

        let outcomes = join_all((0..3).map(|_| coordinator.refresh())).await;

        assert_eq!(refresher.calls(), 1);
        for outcome in outcomes {
            assert_eq!(outcome, Err(RefreshFailure::Rejected { status: 401 }));
        }
        assert!(context.credentials().credential().is_none());
        assert!(matches!(
            events.try_recv(),
            Ok(AuthEvent::ForcedLogout { .. })
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_waiters() {
        let context = context_with(Duration::seconds(-1), Duration::days(1));
        let refresher = MockRefresher::succeeding();
        let coordinator = RefreshCoordinator::new(context, refresher.clone());

        let leader = tokio::time::timeout(std::time::Duration::from_millis(5), coordinator.refresh());
        assert!(leader.await.is_err());
        assert!(!coordinator.is_refreshing());

        assert_eq!(coordinator.refresh().await, Ok("access-3".to_string()));
    }

    #[test]
    fn test_failure_into_error() {
        assert!(matches!(
            WorkflowError::from(RefreshFailure::RefreshTokenExpired),
            WorkflowError::TokenExpired
        ));
        assert!(matches!(
            WorkflowError::from(RefreshFailure::Rejected { status: 500 }),
            WorkflowError::Authentication { .. }
        ));
    }
}
