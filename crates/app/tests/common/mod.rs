//! Test doubles shared by the integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use vellum_application::{
    AuthApi, Clock, GatewayOptions, HttpClient, HttpClientError, MemoryTokenStore,
    RefreshCoordinator, RefreshError, RefreshPolicy, RequestGateway,
};
use vellum_domain::{GatewayRequest, GatewayResponse, TokenPair};

/// Mints an HS256 JWT whose `exp` is `now + offset_secs`.
pub fn jwt(now: DateTime<Utc>, offset_secs: i64, subject: &str) -> String {
    encode(
        &Header::default(),
        &serde_json::json!({
            "sub": subject,
            "exp": now.timestamp() + offset_secs,
        }),
        &EncodingKey::from_secret(b"issuer-secret-the-gateway-never-sees"),
    )
    .expect("token encodes")
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Identity service double that counts refresh calls.
pub struct CountingAuthApi {
    refreshes: AtomicUsize,
    sign_outs: AtomicUsize,
    delay: Duration,
    response: Result<TokenPair, RefreshError>,
    seen_refresh_tokens: Mutex<Vec<String>>,
}

impl CountingAuthApi {
    pub fn returning(response: Result<TokenPair, RefreshError>) -> Self {
        Self {
            refreshes: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
            delay: Duration::ZERO,
            response,
            seen_refresh_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        self.seen_refresh_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthApi for CountingAuthApi {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        tokio::time::sleep(self.delay).await;
        self.response.clone()
    }

    async fn sign_out(&self, _pair: &TokenPair) -> Result<(), RefreshError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Backend double answering with queued outcomes, then 200.
pub struct ScriptedBackend {
    outcomes: Mutex<Vec<Result<u16, HttpClientError>>>,
    seen: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedBackend {
    pub fn answering(statuses: &[u16]) -> Self {
        Self::with_outcomes(statuses.iter().map(|s| Ok(*s)).collect())
    }

    pub fn with_outcomes(outcomes: Vec<Result<u16, HttpClientError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().rev().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<GatewayRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.seen()
            .iter()
            .map(|r| r.headers.get("authorization").map(String::from))
            .collect()
    }
}

#[async_trait]
impl HttpClient for ScriptedBackend {
    async fn execute(&self, request: &GatewayRequest) -> Result<GatewayResponse, HttpClientError> {
        self.seen.lock().unwrap().push(request.clone());
        let outcome = self.outcomes.lock().unwrap().pop().unwrap_or(Ok(200));
        outcome.map(|status| GatewayResponse::new(status, format!("{{\"status\":{status}}}")))
    }
}

pub struct Harness {
    pub now: DateTime<Utc>,
    pub store: Arc<MemoryTokenStore>,
    pub auth: Arc<CountingAuthApi>,
    pub backend: Arc<ScriptedBackend>,
    pub gateway: RequestGateway,
}

pub fn harness(
    now: DateTime<Utc>,
    pair: Option<TokenPair>,
    auth: CountingAuthApi,
    backend: ScriptedBackend,
) -> Harness {
    let store = Arc::new(pair.map_or_else(MemoryTokenStore::new, MemoryTokenStore::with_pair));
    let auth = Arc::new(auth);
    let backend = Arc::new(backend);
    let coordinator = RefreshCoordinator::new(
        store.clone(),
        auth.clone(),
        Arc::new(FixedClock(now)),
        RefreshPolicy::default(),
    );
    let gateway = RequestGateway::new(coordinator, backend.clone(), GatewayOptions::default());

    Harness {
        now,
        store,
        auth,
        backend,
        gateway,
    }
}
