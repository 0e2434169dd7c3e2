//! Builds a gateway from settings.

use std::sync::Arc;

use vellum_application::{
    GatewayOptions, MemoryTokenStore, RefreshCoordinator, RefreshPolicy, RequestGateway,
    TokenStore,
};
use vellum_domain::{GatewaySettings, StorageContext, TokenPair};
use vellum_infrastructure::{
    CookieTokenStore, HttpAuthApi, ReqwestHttpClient, SystemClock, TokioFileSystem,
};

/// Creates the token store for `context`, seeded with `seed` if given.
///
/// # Errors
/// Returns an error if the seed cannot be written to the persistent store.
pub async fn token_store(
    settings: &GatewaySettings,
    context: StorageContext,
    seed: Option<TokenPair>,
) -> Result<Arc<dyn TokenStore>, Box<dyn std::error::Error>> {
    match context {
        StorageContext::RequestScoped => Ok(Arc::new(
            seed.map_or_else(MemoryTokenStore::new, MemoryTokenStore::with_pair),
        )),
        StorageContext::Persistent => {
            let store = CookieTokenStore::new(
                TokioFileSystem::new(),
                settings.session_file.clone(),
                settings.cookie.clone(),
            );
            if let Some(pair) = seed {
                store.set(&pair).await?;
            }
            Ok(Arc::new(store))
        }
    }
}

/// Wires HTTP adapters, the refresh coordinator and the gateway.
///
/// # Errors
/// Returns an error if the configured URLs are unusable.
pub fn build_gateway(
    settings: &GatewaySettings,
    store: Arc<dyn TokenStore>,
) -> Result<RequestGateway, Box<dyn std::error::Error>> {
    let auth = Arc::new(HttpAuthApi::new(settings)?);
    let http = Arc::new(ReqwestHttpClient::new(settings)?);
    let coordinator = RefreshCoordinator::new(
        store,
        auth,
        Arc::new(SystemClock::new()),
        RefreshPolicy {
            timeout: settings.refresh_timeout(),
        },
    );

    Ok(RequestGateway::new(
        coordinator,
        http,
        GatewayOptions {
            accept_language: settings.accept_language.clone(),
        },
    ))
}
