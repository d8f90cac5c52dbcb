//! imds-api — HTTP surface of the instance metadata mock.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/latest/meta-data` | Root category listing |
//! | GET | `/latest/meta-data/{*category}` | Category listing, leaf value or 404 |
//! | PUT | `/latest/api/token` | Issue a session token |
//!
//! Every request is logged and shielded from handler panics. Metadata
//! routes are additionally token gated and cached; the token route never
//! is, so a client can always obtain its first token.

pub mod error;
pub mod format;
pub mod handlers;
pub mod middleware;
pub mod pages;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, put};
use imds_core::routes::{METADATA_PATH, TOKEN_PATH};
use imds_core::{AuthPolicy, ImdsConfig};
use imds_scheduler::LifecycleScheduler;
use imds_state::{DocumentStore, PatchPipeline, ResponseCache};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

pub use error::ServeError;
pub use format::JsonFormat;

/// Shared state for handlers and middleware.
#[derive(Clone)]
pub struct ImdsState {
    pub store: DocumentStore,
    pub cache: ResponseCache,
    pub auth: AuthPolicy,
    pub format: JsonFormat,
}

impl ImdsState {
    /// Unpatched seed document with an empty cache.
    pub fn new(config: &ImdsConfig) -> Self {
        Self {
            store: DocumentStore::seeded(),
            cache: ResponseCache::new(),
            auth: AuthPolicy::from_strict(config.strict_token_auth),
            format: JsonFormat::from_pretty(config.pretty_print_json),
        }
    }
}

/// Build the complete router.
pub fn build_router(state: ImdsState) -> Router {
    let metadata_routes = Router::new()
        .route(METADATA_PATH, get(handlers::get_metadata))
        .route("/latest/meta-data/", get(handlers::get_metadata))
        .route("/latest/meta-data/{*category}", get(handlers::get_metadata))
        .route_layer(from_fn_with_state(state.clone(), middleware::response_cache))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_token))
        .with_state(state);

    Router::new()
        .merge(metadata_routes)
        .route(TOKEN_PATH, put(handlers::put_token))
        .layer(from_fn(middleware::recover_panics))
        .layer(from_fn(middleware::log_requests))
}

/// A configured mock: patched document, armed spot event, and router.
pub struct ImdsServer {
    state: ImdsState,
    port: u16,
    spot_event: Option<JoinHandle<()>>,
}

impl ImdsServer {
    /// Apply the startup patches and arm any delayed spot interruption.
    ///
    /// Must be called from within a tokio runtime when a delayed spot
    /// action is configured.
    pub fn new(config: &ImdsConfig) -> Result<Self, ServeError> {
        let state = ImdsState::new(config);

        let pipeline = PatchPipeline::from_config(config);
        pipeline.run(&state.store)?;
        info!(patches = pipeline.operations().len(), "metadata document prepared");

        let spot_event = if config.simulate_spot {
            LifecycleScheduler::new(state.store.clone(), state.cache.clone())
                .arm(config.spot_action)
        } else {
            None
        };

        Ok(Self {
            state,
            port: config.port,
            spot_event,
        })
    }

    pub fn state(&self) -> &ImdsState {
        &self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServeError> {
        let addr = listener.local_addr()?;
        info!(%addr, "imds mock listening");

        let service = self.router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, service)
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(handle) = self.spot_event {
            handle.abort();
        }
        info!("imds mock stopped");
        Ok(())
    }
}
