use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::{ChainError, Result};
use crate::network;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Ready,
}

/// Install the global tracing subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Calling this more than once is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// A coordinator process: the relay itself plus its optional status API.
pub struct Node {
    pub config: Config,
    pub coordinator: Arc<Coordinator>,
    pub state: Arc<RwLock<NodeState>>,
}

impl Node {
    pub fn init(config: Config) -> Self {
        info!(
            ws = %config.coordinator.ws_bind_addr(),
            api_enabled = config.coordinator.api_enabled,
            "Starting RelayChain coordinator"
        );
        Self {
            config,
            coordinator: Arc::new(Coordinator::new()),
            state: Arc::new(RwLock::new(NodeState::Booting)),
        }
    }

    /// Bind listeners, start the API task and serve peers until failure.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        // 1) The relay port must be available; bind errors are fatal at startup.
        let ws_addr = self.config.coordinator.ws_bind_addr();
        let ws_listener = TcpListener::bind(&ws_addr)
            .await
            .map_err(|e| ChainError::NetworkError(format!("WebSocket port {} unavailable: {}", ws_addr, e)))?;

        // 2) Status API, if enabled.
        if self.config.coordinator.api_enabled {
            let api_addr = self.config.coordinator.api_bind_addr();
            let api_listener = TcpListener::bind(&api_addr)
                .await
                .map_err(|e| ChainError::NetworkError(format!("API port {} unavailable: {}", api_addr, e)))?;

            let node = self.clone();
            tokio::spawn(async move {
                if let Err(e) = Node::start_api(node, api_listener).await {
                    error!("API server failed: {}", e);
                }
            });
        }

        // 3) Ready once every listener is bound.
        {
            let mut s = self.state.write().await;
            *s = NodeState::Ready;
        }

        network::serve(ws_listener, self.coordinator.clone()).await
    }

    #[cfg(feature = "api")]
    async fn start_api(node: Arc<Self>, listener: TcpListener) -> Result<()> {
        let api_node = Arc::new(crate::api::ApiNode::new_shared(
            node.coordinator.clone(),
            Some(node.state.clone()),
        ));
        crate::api::run_api_server(api_node, listener).await
    }

    #[cfg(not(feature = "api"))]
    async fn start_api(_node: Arc<Self>, _listener: TcpListener) -> Result<()> {
        Err(ChainError::ConfigError("API feature not enabled in this build".to_string()))
    }
}
