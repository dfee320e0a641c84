//! Preview server: build once, keep rebuilding, serve the notes root.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};

use vaultview_markdown::{MarkdownRenderer, Renderer};
use vaultview_preview::{BuildConfig, EmitError, PipelineError, PreviewPipeline};

use crate::watcher::{Rebuild, WatchLoop, DEFAULT_DEBOUNCE};

/// Configuration for the preview server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Open browser on start
    pub open: bool,

    /// Rebuild when files change
    pub watch: bool,

    /// Quiet period before a rebuild
    pub debounce: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9099,
            open: false,
            watch: true,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl ServerConfig {
    /// The socket address to bind.
    pub fn addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ServerError::InvalidAddress(addr))
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Setup(#[from] EmitError),

    #[error("Initial build failed: {0}")]
    Build(#[from] PipelineError),

    #[error("Build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] io::Error),
}

impl<R: Renderer + 'static> Rebuild for PreviewPipeline<R> {
    fn rebuild(&self) {
        if let Err(e) = self.run() {
            tracing::error!("Rebuild failed: {}", e);
        }
    }
}

/// Serves the notes root with an always-current preview artifact.
pub struct PreviewServer<R: Renderer = MarkdownRenderer> {
    config: ServerConfig,
    pipeline: Arc<PreviewPipeline<R>>,
}

impl PreviewServer<MarkdownRenderer> {
    /// Create a server for the notes described by `build`.
    pub fn new(build: &BuildConfig, config: ServerConfig) -> Result<Self, ServerError> {
        Ok(Self::with_pipeline(PreviewPipeline::new(build)?, config))
    }
}

impl<R: Renderer + 'static> PreviewServer<R> {
    /// Create a server around an existing pipeline.
    pub fn with_pipeline(pipeline: PreviewPipeline<R>, config: ServerConfig) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Build the artifact, start watching, and bind the listener.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self.config.addr()?;

        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.run()).await??;

        if self.config.watch {
            self.spawn_watch();
        }

        let root = self.pipeline.root().to_path_buf();
        let app = router(root, self.pipeline.destination().to_path_buf());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(BoundServer {
            listener,
            app,
            open: self.config.open,
        })
    }

    /// Build, watch and serve until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        self.bind().await?.serve().await
    }

    fn spawn_watch(&self) {
        let watch_loop = WatchLoop::watch(
            self.pipeline.root(),
            self.pipeline.rules().clone(),
            self.pipeline.destination(),
            Arc::clone(&self.pipeline),
            self.config.debounce,
        );

        match watch_loop {
            Ok(watch_loop) => {
                tracing::info!("Watching {} for changes", self.pipeline.root().display());
                tokio::spawn(watch_loop.run());
            }
            Err(e) => tracing::warn!("{}; serving without watching", e),
        }
    }
}

/// A server whose listener is bound and whose artifact exists.
pub struct BoundServer {
    listener: TcpListener,
    app: Router,
    open: bool,
}

impl BoundServer {
    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Serve)
    }

    /// Serve requests until the process ends.
    pub async fn serve(self) -> Result<(), ServerError> {
        let url = format!("http://{}", self.local_addr()?);
        tracing::info!("Serving preview at {}", url);

        if self.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        axum::serve(self.listener, self.app)
            .await
            .map_err(ServerError::Serve)
    }
}

/// The artifact at `/`, everything else straight from the notes root.
fn router(root: PathBuf, artifact: PathBuf) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(artifact))
        .fallback_service(ServeDir::new(root))
}
