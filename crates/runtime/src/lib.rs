use std::sync::Arc;

use anyhow::{Context, Result};
use brandmarket_auth::{RouteGuard, SessionManager};
use brandmarket_backend::firebase::{FirebaseIdentityClient, FirebaseStorage, FirestoreStore};
use brandmarket_backend::memory::{MemoryBlobStore, MemoryDocumentStore, MemoryIdentityClient};
use brandmarket_backend::{BlobStore, DocumentStore, FirebaseBackend, IdentityClient};
use brandmarket_config::{AppConfig, AuthConfig};
use brandmarket_marketplace::ListingService;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::DEBUG)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// The session manager and listing service wired to one set of backends.
pub struct MarketplaceServices<I, S, B> {
    pub sessions: SessionManager<I, S>,
    pub listings: ListingService<S, B>,
    auth: AuthConfig,
}

impl<I, S, B> Clone for MarketplaceServices<I, S, B> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            listings: self.listings.clone(),
            auth: self.auth.clone(),
        }
    }
}

pub type FirebaseServices =
    MarketplaceServices<FirebaseIdentityClient, FirestoreStore, FirebaseStorage>;

pub type LocalServices =
    MarketplaceServices<MemoryIdentityClient, MemoryDocumentStore, MemoryBlobStore>;

impl<I, S, B> MarketplaceServices<I, S, B>
where
    I: IdentityClient,
    S: DocumentStore,
    B: BlobStore,
{
    /// Start the session manager over the given backends. Must be called
    /// from within a Tokio runtime.
    pub fn assemble(identity: Arc<I>, store: Arc<S>, blobs: Arc<B>, config: &AppConfig) -> Self {
        let sessions = SessionManager::start(identity, Arc::clone(&store), config);
        let listings = ListingService::new(store, blobs, &config.collections);

        Self {
            sessions,
            listings,
            auth: config.auth.clone(),
        }
    }

    /// A route guard following this process's session.
    pub fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(&self.auth, self.sessions.observe_session())
    }

    pub fn shutdown(&self) {
        self.sessions.shutdown();
        info!("marketplace services stopped");
    }
}

impl FirebaseServices {
    pub fn initialise(config: &AppConfig) -> Result<Self> {
        if config.firebase.api_key.is_none() {
            warn!("firebase api key is not configured; identity calls will be rejected");
        }

        let backend = FirebaseBackend::connect(&config.firebase, config.auth.refresh_token.clone())
            .context("failed to build firebase clients")?;

        info!(
            project = %config.firebase.project_id,
            bucket = %config.firebase.bucket(),
            "firebase backend ready"
        );

        Ok(Self::assemble(
            Arc::new(backend.identity),
            Arc::new(backend.documents),
            Arc::new(backend.blobs),
            config,
        ))
    }

    /// Refresh token to persist so the next run restores the session.
    pub fn refresh_token(&self) -> Option<String> {
        self.sessions.identity().refresh_token()
    }
}

impl LocalServices {
    /// Services over in-process backends, for development without Firebase.
    pub fn in_memory(config: &AppConfig) -> Self {
        info!("using in-memory backends");
        Self::assemble(
            Arc::new(MemoryIdentityClient::new()),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryBlobStore::default()),
            config,
        )
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
