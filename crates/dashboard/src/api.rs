//! HTTP API: cluster status, health checks and Prometheus metrics

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use karpx_lib::{Inspector, KubeClusterSource};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Which contexts `/api/clusters` inspects
#[derive(Clone)]
pub enum ContextSelection {
    /// A fixed list, in display order
    Fixed(Vec<String>),
    /// Every context of the kubeconfig, re-read on each request
    Kubeconfig(Arc<KubeClusterSource>),
}

impl ContextSelection {
    /// Contexts to inspect. The kubeconfig is read on the blocking pool.
    async fn resolve(&self) -> anyhow::Result<Vec<String>> {
        match self {
            ContextSelection::Fixed(contexts) => Ok(contexts.clone()),
            ContextSelection::Kubeconfig(source) => {
                let source = Arc::clone(source);
                let contexts = tokio::task::spawn_blocking(move || source.list_contexts()).await??;
                Ok(contexts)
            }
        }
    }
}

/// Shared application state
pub struct AppState {
    pub inspector: Inspector,
    pub contexts: ContextSelection,
    pub started_at: DateTime<Utc>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(inspector: Inspector, contexts: ContextSelection) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inspector,
            contexts,
            started_at: Utc::now(),
            shutdown,
        }
    }

    /// Abandon in-flight inspections; requests still running answer 503
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.shutdown.subscribe();
        async move {
            let _ = receiver.wait_for(|stopping| *stopping).await;
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Status of every selected cluster, in selection order
async fn clusters(State(state): State<Arc<AppState>>) -> Response {
    let contexts = match state.contexts.resolve().await {
        Ok(contexts) => contexts,
        Err(e) => {
            warn!(error = %e, "Could not list kubeconfig contexts");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    match state.inspector.inspect_until(&contexts, state.shutdown_signal()).await {
        Ok(statuses) => ([(header::CACHE_CONTROL, "no-store")], Json(statuses)).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_seconds": uptime.num_seconds(),
    }))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/clusters", get(clusters))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Starting dashboard server");

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
