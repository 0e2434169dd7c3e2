//! Single-flight access token refresh.
//!
//! A coordinator serves exactly one token store, and so one storage
//! context. While a refresh call for that context is outstanding, every
//! caller that needs a fresh token joins it instead of starting another.
//!
//! The network call runs in its own task. A caller that stops waiting
//! does not cancel it; the remaining waiters still get the result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use vellum_domain::{StorageContext, TokenPair, is_expired, redact};

use crate::ports::{AuthApi, Clock, RefreshError, TokenStore, TokenStoreError};

/// Bounds applied to a refresh call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// A refresh still running after this long counts as failed.
    pub timeout: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// What to do with the pair currently in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    /// Nothing stored.
    NoSession,
    /// The access token can be used as is.
    Use(String),
    /// The session cannot be extended and must be cleared.
    Clear,
    /// Exchange this refresh token for a new pair.
    Refresh(String),
}

/// Decides how to obtain an access token from `pair` at `now`.
///
/// A `rejected` access token is never handed out again, even if it still
/// looks valid locally.
fn plan(pair: Option<&TokenPair>, now: DateTime<Utc>, rejected: Option<&str>) -> Plan {
    let Some(pair) = pair else {
        return Plan::NoSession;
    };

    let usable_access = pair
        .access_token()
        .filter(|access| Some(*access) != rejected && !is_expired(access, now));
    if let Some(access) = usable_access {
        return Plan::Use(access.to_string());
    }

    match pair.refresh_token() {
        Some(refresh) if !is_expired(refresh, now) => Plan::Refresh(refresh.to_string()),
        _ => Plan::Clear,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RefreshState {
    Pending,
    Done(Option<String>),
}

/// The in-flight refresh for this context.
#[derive(Debug)]
struct RefreshOperation {
    id: u64,
    subscribers: usize,
    outcome: watch::Receiver<RefreshState>,
}

struct Shared {
    store: Arc<dyn TokenStore>,
    auth: Arc<dyn AuthApi>,
    clock: Arc<dyn Clock>,
    policy: RefreshPolicy,
    slot: Mutex<Option<RefreshOperation>>,
    /// Bumped on every explicit session end.
    epoch: AtomicU64,
    next_id: AtomicU64,
}

/// Produces a usable access token for one storage context.
#[derive(Clone)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("context", &self.context())
            .field("policy", &self.shared.policy)
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    /// Create a coordinator over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        auth: Arc<dyn AuthApi>,
        clock: Arc<dyn Clock>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                auth,
                clock,
                policy,
                slot: Mutex::new(None),
                epoch: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The context of the underlying store.
    #[must_use]
    pub fn context(&self) -> StorageContext {
        self.shared.store.context()
    }

    /// Returns a usable access token, refreshing the pair if needed.
    ///
    /// `None` means the caller should proceed unauthenticated: there is no
    /// session, it could not be extended, or the refresh failed.
    pub async fn ensure_valid_access_token(&self) -> Option<String> {
        let pair = self.shared.load().await;
        match plan(pair.as_ref(), self.shared.clock.now(), None) {
            Plan::NoSession => None,
            Plan::Use(access) => Some(access),
            Plan::Clear | Plan::Refresh(_) => self.settle(None).await,
        }
    }

    /// Returns a replacement for an access token the server rejected.
    ///
    /// The local expiry check is skipped for `rejected`. If the store
    /// already holds a different, unexpired access token, that one is
    /// returned without a network call.
    pub async fn refresh_after_rejection(&self, rejected: Option<&str>) -> Option<String> {
        debug!(
            context = self.context().key(),
            rejected = %rejected.map_or_else(|| "none".to_string(), redact),
            "forcing refresh after rejection"
        );
        self.settle(rejected).await
    }

    /// The pair currently stored, if readable.
    pub async fn current_pair(&self) -> Option<TokenPair> {
        self.shared.load().await
    }

    /// Ends the local session.
    ///
    /// A refresh still in flight is detached; its result is discarded and
    /// its waiters get `None`.
    ///
    /// # Errors
    /// Returns an error if the store could not be cleared.
    pub async fn clear_session(&self) -> Result<(), TokenStoreError> {
        let mut slot = self.shared.slot.lock().await;
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(op) = slot.take() {
            debug!(
                context = self.context().key(),
                operation = op.id,
                "detaching refresh from ended session"
            );
        }
        self.shared.store.clear().await?;
        info!(context = self.context().key(), "session cleared");
        Ok(())
    }

    /// Tells the identity service the session is over, then clears it.
    ///
    /// The service call is best effort. The local session is cleared
    /// even when it fails.
    ///
    /// # Errors
    /// Returns an error only if the store could not be cleared.
    pub async fn sign_out(&self) -> Result<(), TokenStoreError> {
        if let Some(pair) = self.current_pair().await {
            if let Err(e) = self.shared.auth.sign_out(&pair).await {
                warn!(error = %e, "sign-out call failed; clearing local session anyway");
            }
        }
        self.clear_session().await
    }

    /// Joins the pending refresh or decides again under the slot lock.
    async fn settle(&self, rejected: Option<&str>) -> Option<String> {
        let outcome = {
            let mut slot = self.shared.slot.lock().await;

            if let Some(op) = slot.as_mut() {
                if op.outcome.has_changed().is_ok() {
                    op.subscribers += 1;
                    debug!(
                        context = self.context().key(),
                        operation = op.id,
                        subscribers = op.subscribers,
                        "joining pending refresh"
                    );
                    op.outcome.clone()
                } else {
                    warn!(operation = op.id, "refresh task vanished without a result");
                    *slot = None;
                    return None;
                }
            } else {
                let pair = self.shared.load().await;
                match plan(pair.as_ref(), self.shared.clock.now(), rejected) {
                    Plan::NoSession => return None,
                    Plan::Use(access) => return Some(access),
                    Plan::Clear => {
                        info!(
                            context = self.context().key(),
                            "session cannot be extended; clearing"
                        );
                        self.shared.clear_store().await;
                        return None;
                    }
                    Plan::Refresh(refresh_token) => self.start(&mut slot, refresh_token),
                }
            }
        };

        wait_for_outcome(outcome).await
    }

    fn start(
        &self,
        slot: &mut Option<RefreshOperation>,
        refresh_token: String,
    ) -> watch::Receiver<RefreshState> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let epoch = self.shared.epoch.load(Ordering::SeqCst);
        let (tx, rx) = watch::channel(RefreshState::Pending);

        *slot = Some(RefreshOperation {
            id,
            subscribers: 1,
            outcome: rx.clone(),
        });

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.run_refresh(id, epoch, refresh_token, tx).await;
        });

        rx
    }
}

impl Shared {
    async fn load(&self) -> Option<TokenPair> {
        match self.store.get().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(context = self.store.context().key(), error = %e, "token store read failed");
                None
            }
        }
    }

    async fn clear_store(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(context = self.store.context().key(), error = %e, "token store clear failed");
        }
    }

    async fn run_refresh(
        &self,
        id: u64,
        epoch: u64,
        refresh_token: String,
        tx: watch::Sender<RefreshState>,
    ) {
        let context = self.store.context().key();
        info!(
            context,
            operation = id,
            refresh_token = %redact(&refresh_token),
            "refreshing access token"
        );

        let result = tokio::time::timeout(self.policy.timeout, self.auth.refresh(&refresh_token))
            .await
            .unwrap_or(Err(RefreshError::Timeout));

        let mut slot = self.slot.lock().await;

        let access = if self.epoch.load(Ordering::SeqCst) == epoch {
            self.complete(id, result).await
        } else {
            info!(context, operation = id, "session ended during refresh; result discarded");
            None
        };

        if slot.as_ref().is_some_and(|op| op.id == id) {
            *slot = None;
        }

        debug!(
            context,
            operation = id,
            subscribers = tx.receiver_count(),
            refreshed = access.is_some(),
            "publishing refresh outcome"
        );
        tx.send_replace(RefreshState::Done(access));
    }

    async fn complete(&self, id: u64, result: Result<TokenPair, RefreshError>) -> Option<String> {
        let context = self.store.context().key();
        match result {
            Ok(pair) if pair.access_token().is_some() => {
                if let Err(e) = self.store.set(&pair).await {
                    warn!(context, operation = id, error = %e, "could not persist refreshed pair");
                }
                info!(context, operation = id, "access token refreshed");
                pair.access_token
            }
            Ok(_) => {
                warn!(context, operation = id, "refresh returned no access token; clearing session");
                self.clear_store().await;
                None
            }
            Err(e) => {
                warn!(context, operation = id, error = %e, "refresh failed; clearing session");
                self.clear_store().await;
                None
            }
        }
    }
}

async fn wait_for_outcome(mut outcome: watch::Receiver<RefreshState>) -> Option<String> {
    match outcome
        .wait_for(|state| matches!(state, RefreshState::Done(_)))
        .await
    {
        Ok(state) => match &*state {
            RefreshState::Done(access) => access.clone(),
            RefreshState::Pending => None,
        },
        Err(_) => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use async_trait::async_trait;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    fn token(exp: DateTime<Utc>, tag: &str) -> String {
        encode(
            &Header::default(),
            &serde_json::json!({ "exp": exp.timestamp(), "sub": tag }),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct ScriptedAuth {
        calls: AtomicUsize,
        sign_outs: AtomicUsize,
        delay: Duration,
        response: Result<TokenPair, RefreshError>,
    }

    impl ScriptedAuth {
        fn new(response: Result<TokenPair, RefreshError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                sign_outs: AtomicUsize::new(0),
                delay: Duration::ZERO,
                response,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthApi for ScriptedAuth {
        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.response.clone()
        }

        async fn sign_out(&self, _pair: &TokenPair) -> Result<(), RefreshError> {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
            Err(RefreshError::Rejected { status: 500 })
        }
    }

    struct Fixture {
        store: Arc<MemoryTokenStore>,
        auth: Arc<ScriptedAuth>,
        coordinator: RefreshCoordinator,
    }

    fn fixture(pair: Option<TokenPair>, auth: ScriptedAuth) -> Fixture {
        let now = Utc::now();
        let store = Arc::new(pair.map_or_else(MemoryTokenStore::new, MemoryTokenStore::with_pair));
        let auth = Arc::new(auth);
        let coordinator = RefreshCoordinator::new(
            store.clone(),
            auth.clone(),
            Arc::new(FixedClock(now)),
            RefreshPolicy::default(),
        );
        Fixture {
            store,
            auth,
            coordinator,
        }
    }

    fn minutes(n: i64) -> chrono::Duration {
        chrono::Duration::minutes(n)
    }

    #[test]
    fn test_plan() {
        let now = Utc::now();
        let live = token(now + minutes(10), "a");
        let dead = token(now - minutes(1), "a");
        let refresh = token(now + minutes(60), "r");

        assert_eq!(plan(None, now, None), Plan::NoSession);
        assert_eq!(
            plan(Some(&TokenPair::new(live.clone(), refresh.clone())), now, None),
            Plan::Use(live.clone())
        );
        assert_eq!(
            plan(Some(&TokenPair::new(dead.clone(), refresh.clone())), now, None),
            Plan::Refresh(refresh.clone())
        );
        assert_eq!(
            plan(Some(&TokenPair::new(live.clone(), refresh.clone())), now, Some(live.as_str())),
            Plan::Refresh(refresh)
        );
        assert_eq!(
            plan(Some(&TokenPair::new(dead.clone(), dead.clone())), now, None),
            Plan::Clear
        );
        assert_eq!(
            plan(Some(&TokenPair::from_parts(Some(dead), None)), now, None),
            Plan::Clear
        );
    }

    #[tokio::test]
    async fn test_valid_access_needs_no_network() {
        let now = Utc::now();
        let access = token(now + minutes(10), "a");
        let f = fixture(
            Some(TokenPair::new(access.clone(), token(now + minutes(60), "r"))),
            ScriptedAuth::new(Err(RefreshError::Timeout)),
        );

        assert_eq!(f.coordinator.ensure_valid_access_token().await, Some(access));
        assert_eq!(f.auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_session() {
        let f = fixture(None, ScriptedAuth::new(Err(RefreshError::Timeout)));
        assert_eq!(f.coordinator.ensure_valid_access_token().await, None);
        assert_eq!(f.auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_access_is_refreshed_once() {
        let now = Utc::now();
        let fresh = TokenPair::new(token(now + minutes(10), "a2"), token(now + minutes(60), "r2"));
        let f = fixture(
            Some(TokenPair::new(
                token(now - minutes(1), "a1"),
                token(now + minutes(60), "r1"),
            )),
            ScriptedAuth::new(Ok(fresh.clone())),
        );

        let access = f.coordinator.ensure_valid_access_token().await;

        assert_eq!(access.as_deref(), fresh.access_token());
        assert_eq!(f.auth.calls(), 1);
        assert_eq!(f.store.snapshot().await, Some(fresh));
    }

    #[tokio::test]
    async fn test_expired_refresh_clears_without_network() {
        let now = Utc::now();
        let f = fixture(
            Some(TokenPair::new(
                token(now - minutes(1), "a1"),
                token(now - minutes(1), "r1"),
            )),
            ScriptedAuth::new(Err(RefreshError::Timeout)),
        );

        assert_eq!(f.coordinator.ensure_valid_access_token().await, None);
        assert_eq!(f.auth.calls(), 0);
        assert_eq!(f.store.snapshot().await, None);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_clears() {
        let now = Utc::now();
        let f = fixture(
            Some(TokenPair::from_parts(Some(token(now - minutes(1), "a1")), None)),
            ScriptedAuth::new(Err(RefreshError::Timeout)),
        );

        assert_eq!(f.coordinator.ensure_valid_access_token().await, None);
        assert_eq!(f.auth.calls(), 0);
        assert_eq!(f.store.snapshot().await, None);
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session() {
        let now = Utc::now();
        let f = fixture(
            Some(TokenPair::new(
                token(now - minutes(1), "a1"),
                token(now + minutes(60), "r1"),
            )),
            ScriptedAuth::new(Err(RefreshError::Rejected { status: 401 })),
        );

        assert_eq!(f.coordinator.ensure_valid_access_token().await, None);
        assert_eq!(f.auth.calls(), 1);
        assert_eq!(f.store.snapshot().await, None);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let now = Utc::now();
        let fresh = TokenPair::new(token(now + minutes(10), "a2"), token(now + minutes(60), "r2"));
        let f = fixture(
            Some(TokenPair::new(
                token(now - minutes(1), "a1"),
                token(now + minutes(60), "r1"),
            )),
            ScriptedAuth::new(Ok(fresh.clone())).with_delay(Duration::from_millis(50)),
        );

        let c = &f.coordinator;
        let results = tokio::join!(
            c.ensure_valid_access_token(),
            c.ensure_valid_access_token(),
            c.ensure_valid_access_token(),
            c.ensure_valid_access_token(),
            c.ensure_valid_access_token(),
        );

        let expected = fresh.access_token.clone();
        assert_eq!(f.auth.calls(), 1);
        for result in [results.0, results.1, results.2, results.3, results.4] {
            assert_eq!(result, expected);
        }
    }

    #[tokio::test]
    async fn test_concurrent_failure_gives_everyone_none() {
        let now = Utc::now();
        let f = fixture(
            Some(TokenPair::new(
                token(now - minutes(1), "a1"),
                token(now + minutes(60), "r1"),
            )),
            ScriptedAuth::new(Err(RefreshError::Transport("reset".to_string())))
                .with_delay(Duration::from_millis(20)),
        );

        let c = &f.coordinator;
        let (a, b, d) = tokio::join!(
            c.ensure_valid_access_token(),
            c.ensure_valid_access_token(),
            c.ensure_valid_access_token(),
        );

        assert_eq!(f.auth.calls(), 1);
        assert_eq!((a, b, d), (None, None, None));
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_cancel_refresh() {
        let now = Utc::now();
        let fresh = TokenPair::new(token(now + minutes(10), "a2"), token(now + minutes(60), "r2"));
        let f = fixture(
            Some(TokenPair::new(
                token(now - minutes(1), "a1"),
                token(now + minutes(60), "r1"),
            )),
            ScriptedAuth::new(Ok(fresh.clone())).with_delay(Duration::from_millis(50)),
        );

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            f.coordinator.ensure_valid_access_token(),
        )
        .await;
        assert!(abandoned.is_err());

        // Joins the refresh the abandoned caller started.
        let access = f.coordinator.ensure_valid_access_token().await;
        assert_eq!(access.as_deref(), fresh.access_token());
        assert_eq!(f.auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_caller_after_completion_sees_new_pair() {
        let now = Utc::now();
        let fresh = TokenPair::new(token(now + minutes(10), "a2"), token(now + minutes(60), "r2"));
        let f = fixture(
            Some(TokenPair::new(
                token(now - minutes(1), "a1"),
                token(now + minutes(60), "r1"),
            )),
            ScriptedAuth::new(Ok(fresh.clone())),
        );

        f.coordinator.ensure_valid_access_token().await;
        let again = f.coordinator.ensure_valid_access_token().await;

        assert_eq!(again.as_deref(), fresh.access_token());
        assert_eq!(f.auth.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_refresh_times_out() {
        let now = Utc::now();
        let f = fixture(
            Some(TokenPair::new(
                token(now - minutes(1), "a1"),
                token(now + minutes(60), "r1"),
            )),
            ScriptedAuth::new(Ok(TokenPair::new("x", "y"))).with_delay(Duration::from_secs(3600)),
        );

        assert_eq!(f.coordinator.ensure_valid_access_token().await, None);
        assert_eq!(f.auth.calls(), 1);
        assert_eq!(f.store.snapshot().await, None);
    }

    #[tokio::test]
    async fn test_rejection_reuses_token_refreshed_by_someone_else() {
        let now = Utc::now();
        let current = token(now + minutes(10), "a2");
        let f = fixture(
            Some(TokenPair::new(current.clone(), token(now + minutes(60), "r2"))),
            ScriptedAuth::new(Err(RefreshError::Timeout)),
        );

        let stale = token(now + minutes(5), "a1");
        let access = f.coordinator.refresh_after_rejection(Some(stale.as_str())).await;

        assert_eq!(access, Some(current));
        assert_eq!(f.auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejection_forces_refresh_of_locally_valid_token() {
        let now = Utc::now();
        let current = token(now + minutes(10), "a1");
        let fresh = TokenPair::new(token(now + minutes(10), "a2"), token(now + minutes(60), "r2"));
        let f = fixture(
            Some(TokenPair::new(current.clone(), token(now + minutes(60), "r1"))),
            ScriptedAuth::new(Ok(fresh.clone())),
        );

        let access = f.coordinator.refresh_after_rejection(Some(current.as_str())).await;

        assert_eq!(access.as_deref(), fresh.access_token());
        assert_eq!(f.auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_session_discards_late_refresh() {
        let now = Utc::now();
        let f = fixture(
            Some(TokenPair::new(
                token(now - minutes(1), "a1"),
                token(now + minutes(60), "r1"),
            )),
            ScriptedAuth::new(Ok(TokenPair::new(
                token(now + minutes(10), "a2"),
                token(now + minutes(60), "r2"),
            )))
            .with_delay(Duration::from_millis(50)),
        );

        let c = &f.coordinator;
        let (access, cleared) = tokio::join!(c.ensure_valid_access_token(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c.clear_session().await
        });

        cleared.unwrap();
        assert_eq!(access, None);
        assert_eq!(f.store.snapshot().await, None);
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_service_fails() {
        let now = Utc::now();
        let f = fixture(
            Some(TokenPair::new(
                token(now + minutes(10), "a1"),
                token(now + minutes(60), "r1"),
            )),
            ScriptedAuth::new(Err(RefreshError::Timeout)),
        );

        f.coordinator.sign_out().await.unwrap();

        assert_eq!(f.auth.sign_outs.load(Ordering::SeqCst), 1);
        assert_eq!(f.store.snapshot().await, None);
        assert_eq!(f.coordinator.ensure_valid_access_token().await, None);
    }
}
