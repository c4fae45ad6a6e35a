use anyhow::{bail, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use billing_metrics::{build_info, BuildInfo, DynMetricSource, MetricSource, PrometheusExporter};
use prometheus::Registry;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    source: DynMetricSource,
    registry: Registry,
    telemetry_path: Arc<str>,
}

impl AppState {
    /// Fails when two metrics would be exposed under the same name.
    pub fn new(source: DynMetricSource, registry: Registry, telemetry_path: &str) -> Result<Self> {
        let mut seen = HashSet::new();
        let static_names = registry
            .gather()
            .into_iter()
            .map(|family| family.get_name().to_string());
        let source_names = source
            .describe()
            .into_iter()
            .map(|desc| desc.fq_name.clone())
            .collect::<Vec<_>>();

        for name in source_names.into_iter().chain(static_names) {
            if !seen.insert(name.clone()) {
                bail!("metric '{}' is exposed more than once", name);
            }
        }

        Ok(Self {
            source,
            registry,
            telemetry_path: Arc::from(telemetry_path),
        })
    }
}

/// Registry for metrics that do not depend on a scrape.
pub fn static_registry(version: &str) -> prometheus::Result<Registry> {
    let registry = Registry::new();
    registry.register(Box::new(build_info(&BuildInfo::current(version))?))?;

    #[cfg(target_os = "linux")]
    registry.register(Box::new(
        prometheus::process_collector::ProcessCollector::for_self(),
    ))?;

    Ok(registry)
}

pub fn router(state: AppState) -> Router {
    let telemetry_path = state.telemetry_path.to_string();

    Router::new()
        .route("/", get(landing_page))
        .route(&telemetry_path, get(metrics))
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let mut families = state.source.collect().await;
    families.extend(state.registry.gather());
    debug!("Serving {} metric families", families.len());

    match PrometheusExporter::encode(families) {
        Ok((body, content_type)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("error encoding metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn landing_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        r#"<html>
<head><title>AWS Billing Exporter</title></head>
<body>
<h1>AWS Billing Exporter</h1>
<p><a href='{}'>Metrics</a></p>
</body>
</html>
"#,
        state.telemetry_path
    ))
}
