//! # HTTP status surface.
//!
//! A thin read-only view over the [`Supervisor`], plus the external trigger:
//!
//! ```text
//! ANY /            → (external mode: connect_all(stagger=true)) → HTML status page
//! ANY <fallback>   → same as /
//! GET /status      → StatusSnapshot as JSON
//! GET /favicon.ico → 204
//! other methods on /status and /favicon.ico → same as /
//! ```
//!
//! ## Rules
//! - Handlers never fail: connection errors are absorbed by the handles and
//!   only show up as status.
//! - In external mode every probe of `/` (or the fallback) triggers exactly one
//!   staggered sweep, whatever the handles' current states.

mod page;

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{any, get},
};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ReconnectMode;
use crate::core::{StatusSnapshot, Supervisor};

type AppState = Arc<Supervisor>;

/// Builds the router over `sup`.
pub fn router(sup: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/", any(index))
        .route("/status", get(status).fallback(index))
        .route("/favicon.ico", get(favicon).fallback(index))
        .fallback(index)
        .layer(TraceLayer::new_for_http())
        .with_state(sup)
}

/// Serves the router on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    sup: Arc<Supervisor>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "status server listening");
    }
    axum::serve(listener, router(sup))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index(State(sup): State<AppState>) -> Html<String> {
    if sup.mode() == ReconnectMode::External {
        sup.connect_all(true);
    }
    let snapshot = sup.status_snapshot().await;
    Html(page::render(&snapshot, Utc::now()))
}

async fn status(State(sup): State<AppState>) -> Json<StatusSnapshot> {
    Json(sup.status_snapshot().await)
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::credentials::Credential;
    use crate::gateway::testing::FakeGateway;

    const RAW: &str = "abcd1234efgh5678";

    fn supervisor(mode: ReconnectMode) -> Arc<Supervisor> {
        let cfg = Config {
            mode,
            ..Config::default()
        };
        Supervisor::builder(cfg)
            .with_gateway(Arc::new(FakeGateway::new()))
            .initialize(vec![
                Credential::new(RAW, 0).unwrap(),
                Credential::new("tokB2", 1).unwrap(),
            ])
            .unwrap()
    }

    async fn hit(sup: &Arc<Supervisor>, method: &str, uri: &str) -> (StatusCode, String) {
        let response = router(Arc::clone(sup))
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_external_mode_sweeps_once_per_probe() {
        let sup = supervisor(ReconnectMode::External);

        let (code, body) = hit(&sup, "GET", "/").await;
        assert_eq!(code, StatusCode::OK);
        assert!(body.contains("Your account is alive!"));
        assert_eq!(sup.status_snapshot().await.sweeps, 1);

        hit(&sup, "POST", "/").await;
        hit(&sup, "GET", "/some/other/path").await;
        assert_eq!(sup.status_snapshot().await.sweeps, 3);
    }

    #[tokio::test]
    async fn test_other_methods_fall_back_to_index() {
        let sup = supervisor(ReconnectMode::External);

        for (method, uri) in [("POST", "/status"), ("POST", "/favicon.ico"), ("DELETE", "/status")] {
            let (code, body) = hit(&sup, method, uri).await;
            assert_eq!(code, StatusCode::OK, "{method} {uri}");
            assert!(body.contains("Your account is alive!"), "{method} {uri}");
        }
        assert_eq!(sup.status_snapshot().await.sweeps, 3);

        let (code, _) = hit(&sup, "GET", "/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(sup.status_snapshot().await.sweeps, 3);
    }

    #[tokio::test]
    async fn test_internal_mode_probe_is_read_only() {
        let sup = supervisor(ReconnectMode::Internal);
        let (code, _) = hit(&sup, "GET", "/").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(sup.status_snapshot().await.sweeps, 0);
    }

    #[tokio::test]
    async fn test_favicon_is_empty() {
        let sup = supervisor(ReconnectMode::External);
        let (code, body) = hit(&sup, "GET", "/favicon.ico").await;
        assert_eq!(code, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
        assert_eq!(sup.status_snapshot().await.sweeps, 0);
    }

    #[tokio::test]
    async fn test_status_json_is_masked() {
        let sup = supervisor(ReconnectMode::Internal);
        let (code, body) = hit(&sup, "GET", "/status").await;
        assert_eq!(code, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["handle_count"], 2);
        assert_eq!(json["mode"], "internal");
        assert_eq!(json["handles"][0]["state"], "disconnected");
        assert_eq!(json["handles"][0]["credential"], "abcd1234...5678");
        assert!(!body.contains(RAW));
    }

    #[tokio::test]
    async fn test_page_never_shows_raw_credential() {
        let sup = supervisor(ReconnectMode::Internal);
        let (_, body) = hit(&sup, "GET", "/").await;
        assert!(body.contains("abcd1234...5678"));
        assert!(!body.contains(RAW));
        assert!(!body.contains("tokB2"));
    }
}
