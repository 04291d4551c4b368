//! HTTP/WebSocket listener
//!
//! One axum router serves both surfaces:
//!
//! ```text
//!   GET {ws_path}  ──► upgrade ──► connection::handle_socket ──► Relay::subscribe
//!   GET /*         ──► ServeDir(static_dir)
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use crate::error::Result;
use crate::relay::Relay;
use crate::server::config::ServerConfig;
use crate::server::connection;

/// State shared by every request handler
#[derive(Clone)]
struct AppState {
    relay: Arc<Relay>,
    connections: Option<Arc<Semaphore>>,
}

/// Frame relay HTTP server
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<Relay>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a new server for `relay`
    pub fn new(config: ServerConfig, relay: Relay) -> Self {
        Self::with_shared_relay(config, Arc::new(relay))
    }

    /// Create a new server for a relay that is also used elsewhere
    pub fn with_shared_relay(config: ServerConfig, relay: Arc<Relay>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            relay,
            connection_semaphore,
        }
    }

    /// Get a reference to the relay
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Build the request router
    ///
    /// Peer addresses are only logged when the router is served with
    /// `into_make_service_with_connect_info::<SocketAddr>()`.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: Arc::clone(&self.relay),
            connections: self.connection_semaphore.clone(),
        };

        Router::new()
            .route(&self.config.ws_path, get(ws_handler))
            .fallback_service(ServeDir::new(&self.config.static_dir))
            .with_state(state)
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(
            addr = %listener.local_addr()?,
            ws_path = %self.config.ws_path,
            static_dir = %self.config.static_dir.display(),
            "Relay server listening"
        );

        let stats_handle = self.spawn_stats_task();

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        if let Some(handle) = stats_handle {
            handle.abort();
        }

        Ok(result?)
    }

    /// Periodically log pipeline counters
    fn spawn_stats_task(&self) -> Option<JoinHandle<()>> {
        let period = self.config.stats_interval;
        if period.is_zero() {
            return None;
        }

        let stats = Arc::clone(self.relay.stats());
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let snapshot = stats.snapshot();
                let fps = (snapshot.ingest_fps() * 10.0).round() / 10.0;
                tracing::info!(
                    frames = snapshot.frames_ingested,
                    fps = fps,
                    bitrate = snapshot.ingest_bitrate(),
                    delivered = snapshot.frames_delivered,
                    dropped = snapshot.frames_dropped,
                    subscribers = snapshot.live_subscribers,
                    "Relay stats"
                );
            }
        }))
    }
}

async fn ws_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ws: WebSocketUpgrade,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);

    if !state.relay.is_running() {
        tracing::debug!(peer = ?peer, "WebSocket rejected: stream ended");
        return (StatusCode::SERVICE_UNAVAILABLE, "stream ended").into_response();
    }

    // Check connection limit
    let permit = if let Some(ref sem) = state.connections {
        match sem.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(peer = ?peer, "WebSocket rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached")
                    .into_response();
            }
        }
    } else {
        None
    };

    ws.on_upgrade(move |socket| async move {
        let _permit = permit;
        connection::handle_socket(socket, peer, state.relay).await;
    })
}
