//! Integration tests for the dashboard API endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use karpx_dashboard::api::{create_router, AppState, ContextSelection};
use karpx_lib::cluster::{DeploymentInfo, SourceError};
use karpx_lib::compat::ReleaseError;
use karpx_lib::workload::PodRequests;
use karpx_lib::{ClusterSource, CompatMatrix, Inspector, InspectorConfig, KubeClusterSource, ReleaseSource, Resolver};
use semver::Version;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Every context is an EKS cluster on 1.30 without Karpenter, except
/// `offline` which is unreachable
struct FakeClusters {
    delay: Duration,
}

#[async_trait]
impl ClusterSource for FakeClusters {
    async fn server_endpoint(&self, _context: &str) -> Option<String> {
        Some("https://ABC.gr7.eu-west-1.eks.amazonaws.com".to_string())
    }

    async fn server_version(&self, context: &str) -> Result<String, SourceError> {
        tokio::time::sleep(self.delay).await;
        if context == "offline" {
            return Err(SourceError::api("get server version", "connection refused"));
        }
        Ok("v1.30.4-eks-a737599".to_string())
    }

    async fn node_provider_ids(&self, _context: &str) -> Result<Vec<String>, SourceError> {
        Ok(Vec::new())
    }

    async fn running_pods(&self, _context: &str) -> Result<Vec<PodRequests>, SourceError> {
        Ok(Vec::new())
    }

    async fn has_batch_workloads(&self, _context: &str) -> Result<bool, SourceError> {
        Ok(false)
    }

    async fn controller_deployments(&self, _context: &str) -> Result<Vec<DeploymentInfo>, SourceError> {
        Ok(Vec::new())
    }
}

struct FixedReleases;

#[async_trait]
impl ReleaseSource for FixedReleases {
    async fn fetch_releases(&self) -> Result<Vec<Version>, ReleaseError> {
        Ok(vec![Version::new(1, 3, 3), Version::new(1, 2, 1)])
    }
}

fn setup_test_app(contexts: &[&str], delay: Duration) -> (Router, Arc<AppState>) {
    let resolver = Resolver::new(Arc::new(CompatMatrix::builtin()), Arc::new(FixedReleases));
    let inspector = Inspector::new(Arc::new(FakeClusters { delay }), resolver, InspectorConfig::default());
    let selection = ContextSelection::Fixed(contexts.iter().map(|c| c.to_string()).collect());

    let state = Arc::new(AppState::new(inspector, selection));
    (create_router(state.clone()), state)
}

fn setup_kubeconfig_app(kubeconfig: &std::path::Path) -> Router {
    let resolver = Resolver::new(Arc::new(CompatMatrix::builtin()), Arc::new(FixedReleases));
    let inspector = Inspector::new(
        Arc::new(FakeClusters { delay: Duration::ZERO }),
        resolver,
        InspectorConfig::default(),
    );
    let selection = ContextSelection::Kubeconfig(Arc::new(KubeClusterSource::with_kubeconfig(kubeconfig)));

    create_router(Arc::new(AppState::new(inspector, selection)))
}

const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters: []
users: []
contexts:
- name: prod
  context:
    cluster: prod
    user: prod
- name: offline
  context:
    cluster: offline
    user: offline
current-context: prod
"#;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_clusters_returns_status_per_context() {
    let (app, _state) = setup_test_app(&["prod", "offline", "staging"], Duration::ZERO);

    let response = app.oneshot(get("/api/clusters")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

    let statuses = json_body(response).await;
    let statuses = statuses.as_array().unwrap();
    assert_eq!(statuses.len(), 3);

    assert_eq!(statuses[0]["context"], "prod");
    assert_eq!(statuses[0]["provider"], "aws");
    assert_eq!(statuses[0]["k8s_version"], "v1.30.4-eks-a737599");
    assert_eq!(statuses[0]["controller_installed"], false);
    assert_eq!(statuses[0]["latest_compatible"], "1.3.3");
    assert_eq!(statuses[0]["min_compatible"], "0.37.0");
    assert!(statuses[0].get("error").is_none());

    assert_eq!(statuses[1]["context"], "offline");
    assert_eq!(
        statuses[1]["error"],
        "cluster unreachable: get server version: connection refused"
    );

    assert_eq!(statuses[2]["context"], "staging");
}

#[tokio::test]
async fn test_clusters_reads_contexts_from_kubeconfig() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config");
    std::fs::write(&path, KUBECONFIG).unwrap();
    let app = setup_kubeconfig_app(&path);

    let response = app.oneshot(get("/api/clusters")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let statuses = json_body(response).await;
    let statuses = statuses.as_array().unwrap();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0]["context"], "prod");
    assert_eq!(statuses[1]["context"], "offline");
    assert!(statuses[1]["error"].is_string());
}

#[tokio::test]
async fn test_clusters_with_unreadable_kubeconfig() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_kubeconfig_app(&dir.path().join("missing"));

    let response = app.oneshot(get("/api/clusters")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_clusters_with_no_contexts() {
    let (app, _state) = setup_test_app(&[], Duration::ZERO);

    let response = app.oneshot(get("/api/clusters")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_clusters_returns_503_on_shutdown() {
    let (app, state) = setup_test_app(&["prod"], Duration::from_secs(30));

    let trigger = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.shutdown();
    });

    let response = tokio::time::timeout(Duration::from_secs(5), app.oneshot(get("/api/clusters")))
        .await
        .expect("request should end when the dashboard shuts down")
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "inspection cancelled");
}

#[tokio::test]
async fn test_healthz_returns_ok() {
    let (app, _state) = setup_test_app(&[], Duration::ZERO);

    let response = app.oneshot(get("/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "ok");
    assert!(health["uptime_seconds"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_metrics_exposes_inspection_counters() {
    let (app, _state) = setup_test_app(&["prod"], Duration::ZERO);

    let response = app.clone().oneshot(get("/api/clusters")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("karpx_inspections_total"));
    assert!(text.contains("karpx_inspection_duration_seconds"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _state) = setup_test_app(&[], Duration::ZERO);

    let response = app.oneshot(get("/api/install")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
