//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: proxy routes under the mount, status route
//! - Gate the proxy routes behind the device-key middleware
//! - Wire up request IDs and request tracing
//! - Serve plain TCP or TLS with graceful shutdown

use std::net::SocketAddr;
use std::time::Duration;

use axum::{middleware, routing::{get, MethodRouter}, Router};
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::UuidRequestId;
use crate::proxy::codec::UrlCodec;
use crate::proxy::fetch::UpstreamClient;
use crate::proxy::handler::proxy_handler;
use crate::security::{access_control_middleware, AccessGate, DeviceKeyStore};
use crate::status::{status_handler, EgressIpCache};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub codec: UrlCodec,
    pub upstream: UpstreamClient,
    pub timeout: Duration,
    pub max_body_bytes: usize,
    /// Scheme assumed for the proxy base when `X-Forwarded-Proto` is absent.
    pub default_scheme: &'static str,
    pub egress: Option<EgressIpCache>,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    egress: Option<EgressIpCache>,
}

impl HttpServer {
    /// Create a server, loading access keys from `access.keys_file` if set.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let store = match &config.access.keys_file {
            Some(path) => DeviceKeyStore::load_from_file(path),
            None => DeviceKeyStore::new(),
        };
        Self::with_key_store(config, store)
    }

    /// Create a server around an already populated key store.
    pub fn with_key_store(config: ProxyConfig, store: DeviceKeyStore) -> Result<Self, ServerError> {
        let egress = if config.status.enabled {
            Some(EgressIpCache::new(&config.status, config.proxy.use_system_proxy)?)
        } else {
            None
        };

        let state = AppState {
            codec: UrlCodec::new(config.proxy.mount_path.clone()),
            upstream: UpstreamClient::new(config.proxy.use_system_proxy)?,
            timeout: Duration::from_millis(config.proxy.timeout_ms),
            max_body_bytes: config.proxy.max_body_bytes,
            default_scheme: if config.listener.tls.is_some() { "https" } else { "http" },
            egress: egress.clone(),
        };
        let gate = AccessGate::new(store, config.access.enabled);

        let router = Self::build_router(&config, state, gate);
        Ok(Self {
            router,
            config,
            egress,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState, gate: AccessGate) -> Router {
        let mount = config.proxy.mount_path.as_str();

        let mut router = Router::new()
            .route(mount, proxy_methods())
            .route(&format!("{mount}/"), proxy_methods())
            .route(&format!("{mount}/{{*target}}"), proxy_methods())
            .route_layer(middleware::from_fn_with_state(gate, access_control_middleware));

        if config.status.enabled {
            router = router.route("/api/status", get(status_handler));
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mount_path = %self.config.proxy.mount_path,
            access_gate = self.config.access.enabled,
            "HTTP server starting"
        );
        self.warm_up();

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!(
            address = %addr,
            mount_path = %self.config.proxy.mount_path,
            access_gate = self.config.access.enabled,
            "HTTPS server starting"
        );
        self.warm_up();

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    fn warm_up(&self) {
        if let Some(egress) = &self.egress {
            egress.spawn_refresh();
        }
    }
}

fn proxy_methods() -> MethodRouter<AppState> {
    get(proxy_handler)
        .post(proxy_handler)
        .put(proxy_handler)
        .patch(proxy_handler)
}
