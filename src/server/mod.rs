use std::sync::Arc;

use axum::extract::RawQuery;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Extension, Router};
use metrics::increment_counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::exporter::Exporter;

pub struct AppState {
    pub exporter: Exporter,
    pub metrics_path: String,
    /// Renders the exporter's own metrics; `None` leaves them out.
    pub self_metrics: Option<PrometheusHandle>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/healthz", get(healthz))
        .route(&state.metrics_path, get(collect_metrics))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "OK"
}

async fn landing(Extension(state): Extension<Arc<AppState>>) -> Html<String> {
    let collectors: String = state
        .exporter
        .registry()
        .names()
        .map(|name| {
            format!(
                r#"<li><a href="{path}?collect[]={name}">{name}</a></li>"#,
                path = state.metrics_path
            )
        })
        .collect();

    Html(format!(
        r#"<html>
<head><title>Wakatime Exporter</title></head>
<body>
<h1>Wakatime Exporter</h1>
<p><a href="{path}">Metrics</a></p>
<ul>{collectors}</ul>
</body>
</html>"#,
        path = state.metrics_path
    ))
}

/// `collect[]` query values, in request order.
fn collect_filters(query: Option<&str>) -> Vec<String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .filter(|(k, _)| k == "collect[]")
                .map(|(_, v)| v.into_owned())
                .collect()
        })
        .unwrap_or_default()
}

async fn collect_metrics(
    Extension(state): Extension<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let filters = collect_filters(query.as_deref());

    let response = match state.exporter.scrape(filters.as_slice()).await {
        Err(err) => {
            warn!(error = %err, "rejected metrics request");
            (
                StatusCode::BAD_REQUEST,
                format!("Couldn't create filtered metrics handler: {}", err),
            )
                .into_response()
        }
        Ok(report) => match report.render() {
            Ok(mut body) => {
                if let Some(handle) = &state.self_metrics {
                    body.extend_from_slice(handle.render().as_bytes());
                }
                ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response()
            }
            Err(err) => {
                error!(error = %err, "failed to encode metrics");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        },
    };

    increment_counter!(crate::HTTP_REQUESTS, "code" => response.status().as_str().to_owned());
    response
}
