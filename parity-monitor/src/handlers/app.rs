use std::future::ready;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use super::comparison;
use crate::health::HealthRegistry;
use crate::metrics::track_metrics;
use crate::scheduler::ComparisonScheduler;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: ComparisonScheduler,
    pub liveness: HealthRegistry,
}

pub fn app(state: AppState, metrics: Option<PrometheusHandle>) -> Router {
    let liveness = state.liveness.clone();

    let router = Router::new()
        .route("/", get(index))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .route("/api/v1/comparison/run", post(comparison::run))
        .route(
            "/api/v1/comparison/run-from-file",
            post(comparison::run_from_file),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    match metrics {
        Some(recorder_handle) => {
            router.route("/metrics", get(move || ready(recorder_handle.render())))
        }
        None => router,
    }
}

pub async fn index() -> &'static str {
    "chat parity monitor"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_scheduler, ListDirectory};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use time::Duration;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState {
            scheduler: test_scheduler(ListDirectory(Some(vec![]))),
            liveness: HealthRegistry::new("liveness"),
        }
    }

    #[tokio::test]
    async fn test_index() {
        let response = app(state(), None)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"chat parity monitor");
    }

    #[tokio::test]
    async fn test_liveness_follows_scheduler() {
        let state = state();
        let handle = state.liveness.register("scheduler", Duration::seconds(60));
        let router = app(state, None);

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/_liveness").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        handle.report_healthy();
        let response = router
            .oneshot(Request::builder().uri("/_liveness").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_route_only_when_enabled() {
        let response = app(state(), None)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
