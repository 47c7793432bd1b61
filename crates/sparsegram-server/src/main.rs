//! sparsegram diagnostics server.
//!
//! Serves the process-wide registry as text and HTML. Config path is the
//! first argument (default `sparsegram.yaml`).

use tracing_subscriber::{fmt, EnvFilter};

use sparsegram_core::error::{Result, SparsegramError};
use sparsegram_core::Registry;
use sparsegram_server::{app_state, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sparsegram.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.server.listen_addr()?;

    let registry = Registry::init_global(cfg.histograms.limits())?;
    let state = app_state::AppState::new(registry)?;
    let app = router::build_router(state);

    tracing::info!(%listen, "sparsegram-server starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| SparsegramError::Internal(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| SparsegramError::Internal(format!("server failed: {e}")))
}
